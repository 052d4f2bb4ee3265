use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use taskdeck::models::{
    Comment, CommentQuery, Project, ProjectQuery, Task, TaskQuery, TimeLog, TimeLogQuery, User,
};

use super::Session;

const EXPORT_VERSION: i32 = 1;

#[derive(Serialize, Deserialize)]
pub struct ExportData {
    pub version: i32,
    pub exported_at: String,
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub comments: Vec<Comment>,
    pub time_logs: Vec<TimeLog>,
}

async fn collect(session: &Session) -> Result<ExportData> {
    let reconciler = &session.reconciler;
    reconciler.fetch_projects(&ProjectQuery::default()).await?;
    reconciler.fetch_tasks(&TaskQuery::default()).await?;
    reconciler.fetch_comments(&CommentQuery::All).await?;
    reconciler.fetch_time_logs(&TimeLogQuery::default()).await?;

    let store = reconciler.store();
    Ok(ExportData {
        version: EXPORT_VERSION,
        exported_at: chrono::Utc::now().to_rfc3339(),
        users: session.db().list_users()?,
        projects: store.projects.all().to_vec(),
        tasks: store.tasks.all().to_vec(),
        comments: store.comments.all().to_vec(),
        time_logs: store.time_logs.all().to_vec(),
    })
}

pub async fn run_json(session: &Session, output_path: Option<&str>) -> Result<()> {
    let data = collect(session).await?;
    let json = serde_json::to_string_pretty(&data)?;

    match output_path {
        Some(path) => {
            fs::write(path, json).context("Failed to write export file")?;
            println!(
                "Exported {} projects, {} tasks to {}",
                data.projects.len(),
                data.tasks.len(),
                path
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
