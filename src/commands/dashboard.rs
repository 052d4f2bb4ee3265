use anyhow::Result;
use chrono::Utc;

use taskdeck::models::{ProjectQuery, TaskQuery, TaskStatus, TimeLogQuery};
use taskdeck::views::{dashboard_summary, most_recent, my_tasks, performance_metrics, status_tally};

use super::{truncate, Session};

pub async fn run(session: &Session, json: bool) -> Result<()> {
    session
        .reconciler
        .fetch_projects(&ProjectQuery::default())
        .await?;
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;

    let user_id = session.user.as_ref().map(|user| user.id);
    let store = session.reconciler.store();
    let projects = store.projects.all();
    let tasks = store.tasks.all();
    let summary = dashboard_summary(projects, tasks, user_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Projects: {}", summary.total_projects);
    println!("Tasks:    {} ({} closed)", summary.total_tasks, summary.closed_tasks);
    if let Some(user) = &session.user {
        println!("Mine:     {} assigned to {}", summary.my_tasks, user.username);
    }

    let tally = status_tally(tasks);
    if tally.total() > 0 {
        println!("\nBy status:");
        for (status, count) in tally.iter() {
            println!("  {:<14} {:>4}", status.label(), count);
        }
    }

    let limit = session.config.recent_limit;
    let recent_projects = most_recent(projects, limit);
    if !recent_projects.is_empty() {
        println!("\nRecent projects:");
        for project in recent_projects {
            println!(
                "  #{:<4} [{}] {}",
                project.id,
                project.status,
                truncate(&project.title, 50)
            );
        }
    }

    let recent_tasks = most_recent(tasks, limit);
    if !recent_tasks.is_empty() {
        println!("\nRecent tasks:");
        for task in recent_tasks {
            println!("  #{:<4} [{}] {}", task.id, task.status, truncate(&task.title, 50));
        }
    }

    if let Some(user_id) = user_id {
        let open: Vec<_> = my_tasks(tasks, user_id)
            .into_iter()
            .filter(|task| task.status != TaskStatus::Closed)
            .collect();
        if !open.is_empty() {
            println!("\nOpen and assigned to you:");
            for task in open {
                println!("  #{:<4} [{}] {}", task.id, task.status, truncate(&task.title, 50));
            }
        }
    }

    Ok(())
}

pub async fn metrics(session: &Session, json: bool) -> Result<()> {
    session
        .reconciler
        .fetch_projects(&ProjectQuery::default())
        .await?;
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;
    session
        .reconciler
        .fetch_time_logs(&TimeLogQuery::default())
        .await?;

    let store = session.reconciler.store();
    let metrics = performance_metrics(
        store.projects.all(),
        store.tasks.all(),
        store.time_logs.all(),
        &session.config.health,
        Utc::now(),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }

    println!("Tasks completed this week: {}", metrics.tasks_completed_this_week);
    println!("Average completion:        {} days", metrics.avg_completion_days);
    println!(
        "Productivity:              {}% ({}/{} closed)",
        metrics.productivity_score, metrics.completed_tasks, metrics.total_tasks
    );
    println!(
        "Logged hours:              {} ({} per task)",
        metrics.total_logged_hours, metrics.avg_hours_per_task
    );

    println!("\nLast 7 days:");
    for day in &metrics.weekly_trend {
        println!("  {} {:>3}", day.day.format("%a %Y-%m-%d"), day.completed);
    }

    if !metrics.project_health.is_empty() {
        println!("\nProject health:");
        for health in &metrics.project_health {
            println!(
                "  #{:<4} {:<32} {:>3}% {}",
                health.project_id,
                truncate(&health.project_title, 32),
                health.completion_rate,
                health.health_status
            );
        }
    }

    Ok(())
}
