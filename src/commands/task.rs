use anyhow::{bail, Result};

use taskdeck::db::Database;
use taskdeck::models::{
    CommentQuery, NewTask, TaskChanges, TaskPriority, TaskQuery, TaskStatus, TimeLogQuery,
};
use taskdeck::views::{filter_tasks, group_by_status, my_tasks, TaskFilter};

use super::{confirm, truncate, Session};

/// Optional task fields shared by `create` and `update`.
#[derive(Debug, Default)]
pub struct TaskFields<'a> {
    pub description: Option<&'a str>,
    pub status: Option<&'a str>,
    pub priority: Option<&'a str>,
    /// Username of the assignee.
    pub assignee: Option<&'a str>,
    pub estimate: Option<f64>,
}

fn resolve_user(db: &Database, username: &str) -> Result<i64> {
    match db.user_by_username(username)? {
        Some(user) => Ok(user.id),
        None => bail!("Unknown user '{}'", username),
    }
}

pub async fn create(
    session: &Session,
    project_id: i64,
    title: &str,
    fields: &TaskFields<'_>,
) -> Result<()> {
    let assignee_id = fields
        .assignee
        .map(|name| resolve_user(session.db(), name))
        .transpose()?;

    let payload = NewTask {
        title: title.to_string(),
        description: fields.description.map(str::to_string),
        status: fields.status.map(str::parse).transpose()?.unwrap_or_default(),
        priority: fields.priority.map(str::parse).transpose()?.unwrap_or_default(),
        project_id,
        assignee_id,
        estimated_hours: fields.estimate,
    };

    let task = session.reconciler.create_task(&payload).await?;
    println!("Created task #{} in project #{}: {}", task.id, task.project_id, task.title);
    Ok(())
}

pub async fn list(
    session: &Session,
    search: Option<&str>,
    status: &str,
    project: &str,
) -> Result<()> {
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;

    let filter = TaskFilter {
        search: search.unwrap_or_default().to_string(),
        status: status.parse()?,
        project: project.parse()?,
    };
    let store = session.reconciler.store();
    let tasks = filter_tasks(store.tasks.iter(), &filter);

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    for task in tasks {
        let status_display = format!("[{}]", task.status);
        println!(
            "#{:<4} {:16} {:<40} {:8} p#{}",
            task.id,
            status_display,
            truncate(&task.title, 40),
            task.priority,
            task.project_id
        );
    }

    Ok(())
}

pub async fn show(session: &Session, id: i64) -> Result<()> {
    let task = session.reconciler.fetch_task(id).await?;
    session
        .reconciler
        .fetch_comments(&CommentQuery::Task(id))
        .await?;
    session
        .reconciler
        .fetch_time_logs(&TimeLogQuery {
            task_id: Some(id),
            ..Default::default()
        })
        .await?;

    println!("Task #{}: {}", task.id, task.title);
    println!("Project: #{}", task.project_id);
    println!("Status: {}", task.status.label());
    println!("Priority: {}", task.priority);
    if let Some(assignee_id) = task.assignee_id {
        match session.db().get_user(assignee_id)? {
            Some(user) => println!("Assignee: {} ({})", user.username, user.full_name),
            None => println!("Assignee: #{}", assignee_id),
        }
    }
    match task.estimated_hours {
        Some(estimate) => println!("Hours: {} of {} estimated", task.actual_hours, estimate),
        None => println!("Hours: {}", task.actual_hours),
    }
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", task.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(desc) = &task.description {
        if !desc.is_empty() {
            println!("\nDescription:");
            for line in desc.lines() {
                println!("  {}", line);
            }
        }
    }

    let store = session.reconciler.store();
    if !store.time_logs.is_empty() {
        println!("\nTime logs:");
        for log in store.time_logs.iter() {
            println!(
                "  #{} {} {}h {}",
                log.id,
                log.date,
                log.hours,
                log.description.as_deref().unwrap_or("")
            );
        }
    }

    if !store.comments.is_empty() {
        println!("\nComments:");
        for comment in store.comments.iter() {
            println!(
                "  #{} [{}] {}",
                comment.id,
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.content
            );
        }
    }

    Ok(())
}

pub async fn update(
    session: &Session,
    id: i64,
    title: Option<&str>,
    project_id: Option<i64>,
    fields: &TaskFields<'_>,
) -> Result<()> {
    let assignee_id = fields
        .assignee
        .map(|name| resolve_user(session.db(), name))
        .transpose()?;

    let changes = TaskChanges {
        title: title.map(str::to_string),
        description: fields.description.map(str::to_string),
        status: fields.status.map(str::parse::<TaskStatus>).transpose()?,
        priority: fields.priority.map(str::parse::<TaskPriority>).transpose()?,
        project_id,
        assignee_id,
        estimated_hours: fields.estimate,
    };

    let task = session.reconciler.update_task(id, &changes).await?;
    println!("Updated task #{} [{}]", task.id, task.status);
    Ok(())
}

pub async fn delete(session: &Session, id: i64, force: bool) -> Result<()> {
    session.current_user()?;
    let task = session.reconciler.fetch_task(id).await?;

    if !force && !confirm(&format!("Delete task #{} \"{}\"?", id, task.title))? {
        println!("Cancelled.");
        return Ok(());
    }

    session.reconciler.delete_task(id).await?;
    println!("Deleted task #{}", id);
    Ok(())
}

pub async fn board(session: &Session, project_id: Option<i64>) -> Result<()> {
    session
        .reconciler
        .fetch_tasks(&TaskQuery {
            project_id,
            assignee_id: None,
        })
        .await?;

    let store = session.reconciler.store();
    let board = group_by_status(store.tasks.iter(), &TaskStatus::ALL);

    for (status, tasks) in board.iter() {
        println!("== {} ({}) ==", status.label(), tasks.len());
        for task in tasks {
            println!(
                "  #{:<4} {:<8} {}",
                task.id,
                task.priority,
                truncate(&task.title, 50)
            );
        }
    }

    Ok(())
}

pub async fn mine(session: &Session) -> Result<()> {
    let user_id = session.current_user()?.id;
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;

    let store = session.reconciler.store();
    let tasks = my_tasks(store.tasks.iter(), user_id);

    if tasks.is_empty() {
        println!("Nothing assigned to you.");
        return Ok(());
    }

    for task in tasks {
        let status_display = format!("[{}]", task.status);
        println!(
            "#{:<4} {:16} {:<40} {}",
            task.id,
            status_display,
            truncate(&task.title, 40),
            task.priority
        );
    }

    Ok(())
}
