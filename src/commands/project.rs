use anyhow::Result;
use chrono::Utc;

use taskdeck::models::{
    CommentQuery, NewProject, ProjectChanges, ProjectQuery, ProjectStatus, TaskQuery,
};
use taskdeck::views::{
    filter_projects, group_by_status, project_health, project_stats, ProjectFilter,
};

use super::{confirm, parse_optional_date, truncate, Session};

pub async fn create(
    session: &Session,
    title: &str,
    description: Option<&str>,
    status: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<()> {
    let owner = session.current_user()?;
    let payload = NewProject {
        title: title.to_string(),
        description: description.map(str::to_string),
        status: status.parse()?,
        owner_id: owner.id,
        start_date: parse_optional_date(start)?,
        end_date: parse_optional_date(end)?,
    };

    let project = session.reconciler.create_project(&payload).await?;
    println!("Created project #{}: {}", project.id, project.title);
    Ok(())
}

pub async fn list(session: &Session, search: Option<&str>, status: &str, mine: bool) -> Result<()> {
    let query = ProjectQuery {
        status: None,
        owner_id: if mine { Some(session.current_user()?.id) } else { None },
    };
    session.reconciler.fetch_projects(&query).await?;

    let filter = ProjectFilter {
        search: search.unwrap_or_default().to_string(),
        status: status.parse()?,
    };
    let store = session.reconciler.store();
    let projects = filter_projects(store.projects.iter(), &filter);

    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for project in projects {
        let status_display = format!("[{}]", project.status);
        let due = project
            .end_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "#{:<4} {:12} {:<40} due {}",
            project.id,
            status_display,
            truncate(&project.title, 40),
            due
        );
    }

    Ok(())
}

pub async fn show(session: &Session, id: i64) -> Result<()> {
    let project = session.reconciler.fetch_project(id).await?;
    session
        .reconciler
        .fetch_tasks(&TaskQuery {
            project_id: Some(id),
            assignee_id: None,
        })
        .await?;
    session
        .reconciler
        .fetch_comments(&CommentQuery::Project(id))
        .await?;

    let store = session.reconciler.store();
    let tasks = store.tasks.all();
    let stats = project_stats(id, tasks);
    let health = project_health(
        &project,
        tasks,
        &session.config.health,
        Utc::now().date_naive(),
    );

    println!("Project #{}: {}", project.id, project.title);
    println!("Status: {}", project.status.label());
    if let Some(start) = project.start_date {
        println!("Start: {}", start);
    }
    if let Some(end) = project.end_date {
        println!("End: {}", end);
    }
    println!("Created: {}", project.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Updated: {}", project.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(desc) = &project.description {
        if !desc.is_empty() {
            println!("\nDescription:");
            for line in desc.lines() {
                println!("  {}", line);
            }
        }
    }

    println!(
        "\nProgress: {}/{} closed ({}%), health {}{}",
        health.completed_tasks,
        health.total_tasks,
        stats.completion_percentage,
        health.health_status,
        if health.overdue { " (overdue)" } else { "" }
    );
    println!(
        "Hours: {} logged of {} estimated",
        stats.total_actual_hours, stats.total_estimated_hours
    );
    for (status, count) in stats.by_status.iter() {
        if count > 0 {
            println!("  {:<14} {}", status.label(), count);
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
    description: Option<&str>,
    status: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<()> {
    session.current_user()?;
    let changes = ProjectChanges {
        title: title.map(str::to_string),
        description: description.map(str::to_string),
        status: status.map(str::parse::<ProjectStatus>).transpose()?,
        start_date: parse_optional_date(start)?,
        end_date: parse_optional_date(end)?,
    };

    let project = session.reconciler.update_project(id, &changes).await?;
    println!("Updated project #{}", project.id);
    Ok(())
}

pub async fn delete(session: &Session, id: i64, force: bool) -> Result<()> {
    session.current_user()?;
    let project = session.reconciler.fetch_project(id).await?;

    if !force && !confirm(&format!(
        "Delete project #{} \"{}\" with all its tasks?",
        id, project.title
    ))? {
        println!("Cancelled.");
        return Ok(());
    }

    session.reconciler.delete_project(id).await?;
    println!("Deleted project #{}", id);
    Ok(())
}

pub async fn board(session: &Session) -> Result<()> {
    session
        .reconciler
        .fetch_projects(&ProjectQuery::default())
        .await?;

    let store = session.reconciler.store();
    let board = group_by_status(store.projects.iter(), &ProjectStatus::ALL);

    for (status, projects) in board.iter() {
        println!("== {} ({}) ==", status.label(), projects.len());
        for project in projects {
            println!("  #{:<4} {}", project.id, truncate(&project.title, 50));
        }
    }

    Ok(())
}

pub async fn health(session: &Session) -> Result<()> {
    session
        .reconciler
        .fetch_projects(&ProjectQuery::default())
        .await?;
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;

    let store = session.reconciler.store();
    if store.projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    for project in store.projects.iter() {
        let health = project_health(project, store.tasks.all(), &session.config.health, today);
        println!(
            "#{:<4} {:<32} {:>3}% ({}/{}) {}{}",
            health.project_id,
            truncate(&health.project_title, 32),
            health.completion_rate,
            health.completed_tasks,
            health.total_tasks,
            health.health_status,
            if health.overdue { " overdue" } else { "" }
        );
    }

    Ok(())
}
