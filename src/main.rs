mod commands;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::task::TaskFields;
use commands::Session;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Track projects, tasks, comments and time from the terminal")]
#[command(version)]
struct Cli {
    /// Act as this user (overrides default_user in config.json)
    #[arg(long, global = true, env = "TASKDECK_USER")]
    user: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize taskdeck in the current directory
    Init {
        /// Overwrite config.json with the defaults
        #[arg(short, long)]
        force: bool,
        /// Record the user to act as when --user is not given
        #[arg(long)]
        default_user: Option<String>,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectCommands,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskCommands,
    },

    /// Comment on tasks and projects
    Comment {
        #[command(subcommand)]
        action: CommentCommands,
    },

    /// Log time against tasks
    Log {
        #[command(subcommand)]
        action: LogCommands,
    },

    /// Overview of projects and tasks
    Dashboard {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Completion, throughput and project health metrics
    Metrics {
        /// Print the metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export all data to JSON
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add {
        username: String,
        /// Display name
        full_name: String,
    },
    /// List users
    List,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project owned by the current user
    Create {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Status (active, on_hold, completed, cancelled)
        #[arg(short, long, default_value = "active")]
        status: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
    /// List projects
    List {
        /// Case-insensitive search in title and description
        #[arg(short = 'q', long)]
        search: Option<String>,
        /// Filter by status, or "all"
        #[arg(short, long, default_value = "all")]
        status: String,
        /// Only projects owned by the current user
        #[arg(long)]
        mine: bool,
    },
    /// Show a project with its statistics
    Show { id: i64 },
    /// Update a project
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete a project and its tasks
    Delete {
        id: i64,
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Projects grouped by status
    Board,
    /// Completion rate and health of every project
    Health,
}

#[derive(Args)]
struct TaskArgs {
    #[arg(short, long)]
    description: Option<String>,
    /// Status (todo, in_progress, review, ready_to_test, in_test, closed)
    #[arg(short, long)]
    status: Option<String>,
    /// Priority (low, medium, high, urgent)
    #[arg(short, long)]
    priority: Option<String>,
    /// Username of the assignee
    #[arg(short, long)]
    assignee: Option<String>,
    /// Estimated hours
    #[arg(short, long)]
    estimate: Option<f64>,
}

impl TaskArgs {
    fn fields(&self) -> TaskFields<'_> {
        TaskFields {
            description: self.description.as_deref(),
            status: self.status.as_deref(),
            priority: self.priority.as_deref(),
            assignee: self.assignee.as_deref(),
            estimate: self.estimate,
        }
    }
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a task in a project
    Create {
        /// Project ID
        project: i64,
        title: String,
        #[command(flatten)]
        fields: TaskArgs,
    },
    /// List tasks
    List {
        #[arg(short = 'q', long)]
        search: Option<String>,
        /// Filter by status, or "all"
        #[arg(short, long, default_value = "all")]
        status: String,
        /// Filter by project ID, or "all"
        #[arg(short, long, default_value = "all")]
        project: String,
    },
    /// Show a task with its comments and time logs
    Show { id: i64 },
    /// Update a task
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        /// Move to another project
        #[arg(long)]
        project: Option<i64>,
        #[command(flatten)]
        fields: TaskArgs,
    },
    /// Delete a task
    Delete {
        id: i64,
        #[arg(short, long)]
        force: bool,
    },
    /// Tasks grouped by status
    Board {
        /// Only tasks of this project
        #[arg(short, long)]
        project: Option<i64>,
    },
    /// Tasks assigned to the current user
    Mine,
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Comment on a task or a project
    Add {
        content: String,
        #[arg(long, conflicts_with = "project")]
        task: Option<i64>,
        #[arg(long)]
        project: Option<i64>,
    },
    /// List comments, newest first
    List {
        #[arg(long, conflicts_with = "project")]
        task: Option<i64>,
        #[arg(long)]
        project: Option<i64>,
    },
    /// Replace a comment's content
    Edit { id: i64, content: String },
    /// Delete a comment
    Delete {
        id: i64,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum LogCommands {
    /// Log hours on a task
    Add {
        /// Task ID
        task: i64,
        hours: f64,
        /// Date worked (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List time logs
    List {
        #[arg(long)]
        task: Option<i64>,
        /// Only the current user's logs
        #[arg(long)]
        mine: bool,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Update a time log
    Edit {
        id: i64,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete a time log
    Delete {
        id: i64,
        #[arg(short, long)]
        force: bool,
    },
    /// Hours per task for the current user
    Summary {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

fn find_taskdeck_dir() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let candidate = current.join(".taskdeck");
        if candidate.exists() && candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!("Not a taskdeck repository (or any parent). Run 'taskdeck init' first.");
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Commands::Init {
        force,
        default_user,
    } = &cli.command
    {
        let cwd = env::current_dir()?;
        return commands::init::run(&cwd, *force, default_user.as_deref());
    }

    let session = Session::open(&find_taskdeck_dir()?, cli.user.as_deref())?;

    match cli.command {
        Commands::Init { .. } => Ok(()),

        Commands::User { action } => match action {
            UserCommands::Add {
                username,
                full_name,
            } => commands::user::add(session.db(), &username, &full_name),
            UserCommands::List => commands::user::list(session.db()),
        },

        Commands::Project { action } => match action {
            ProjectCommands::Create {
                title,
                description,
                status,
                start,
                end,
            } => {
                commands::project::create(
                    &session,
                    &title,
                    description.as_deref(),
                    &status,
                    start.as_deref(),
                    end.as_deref(),
                )
                .await
            }
            ProjectCommands::List {
                search,
                status,
                mine,
            } => commands::project::list(&session, search.as_deref(), &status, mine).await,
            ProjectCommands::Show { id } => commands::project::show(&session, id).await,
            ProjectCommands::Update {
                id,
                title,
                description,
                status,
                start,
                end,
            } => {
                commands::project::update(
                    &session,
                    id,
                    title.as_deref(),
                    description.as_deref(),
                    status.as_deref(),
                    start.as_deref(),
                    end.as_deref(),
                )
                .await
            }
            ProjectCommands::Delete { id, force } => {
                commands::project::delete(&session, id, force).await
            }
            ProjectCommands::Board => commands::project::board(&session).await,
            ProjectCommands::Health => commands::project::health(&session).await,
        },

        Commands::Task { action } => match action {
            TaskCommands::Create {
                project,
                title,
                fields,
            } => commands::task::create(&session, project, &title, &fields.fields()).await,
            TaskCommands::List {
                search,
                status,
                project,
            } => commands::task::list(&session, search.as_deref(), &status, &project).await,
            TaskCommands::Show { id } => commands::task::show(&session, id).await,
            TaskCommands::Update {
                id,
                title,
                project,
                fields,
            } => {
                commands::task::update(&session, id, title.as_deref(), project, &fields.fields())
                    .await
            }
            TaskCommands::Delete { id, force } => commands::task::delete(&session, id, force).await,
            TaskCommands::Board { project } => commands::task::board(&session, project).await,
            TaskCommands::Mine => commands::task::mine(&session).await,
        },

        Commands::Comment { action } => match action {
            CommentCommands::Add {
                content,
                task,
                project,
            } => {
                let parent = commands::comment::parent(task, project)?;
                commands::comment::add(&session, parent, &content).await
            }
            CommentCommands::List { task, project } => {
                let parent = if task.is_none() && project.is_none() {
                    None
                } else {
                    Some(commands::comment::parent(task, project)?)
                };
                commands::comment::list(&session, parent).await
            }
            CommentCommands::Edit { id, content } => {
                commands::comment::edit(&session, id, &content).await
            }
            CommentCommands::Delete { id, force } => {
                commands::comment::delete(&session, id, force).await
            }
        },

        Commands::Log { action } => match action {
            LogCommands::Add {
                task,
                hours,
                date,
                description,
            } => {
                commands::timelog::add(
                    &session,
                    task,
                    hours,
                    date.as_deref(),
                    description.as_deref(),
                )
                .await
            }
            LogCommands::List {
                task,
                mine,
                from,
                to,
            } => {
                commands::timelog::list(&session, task, mine, from.as_deref(), to.as_deref())
                    .await
            }
            LogCommands::Edit {
                id,
                hours,
                description,
                date,
            } => {
                commands::timelog::edit(
                    &session,
                    id,
                    hours,
                    description.as_deref(),
                    date.as_deref(),
                )
                .await
            }
            LogCommands::Delete { id, force } => {
                commands::timelog::delete(&session, id, force).await
            }
            LogCommands::Summary { from, to } => {
                commands::timelog::summary(&session, from.as_deref(), to.as_deref()).await
            }
        },

        Commands::Dashboard { json } => commands::dashboard::run(&session, json).await,
        Commands::Metrics { json } => commands::dashboard::metrics(&session, json).await,
        Commands::Export { output } => {
            commands::export::run_json(&session, output.as_deref()).await
        }
    }
}
