use anyhow::Result;
use chrono::Utc;

use taskdeck::models::{NewTimeLog, TaskQuery, TimeLogChanges, TimeLogQuery};
use taskdeck::views::{time_summary, DateRange};

use super::{confirm, parse_optional_date, truncate, Session};

fn report_total(session: &Session, task_id: i64) {
    if let Ok(task) = session.reconciler.require_task(task_id) {
        println!("Task #{} now has {}h logged", task.id, task.actual_hours);
    }
}

/// Pull the log's task into the store so the new total can be reported.
async fn load_task_of_log(session: &Session, log_id: i64) -> Result<Option<i64>> {
    session
        .reconciler
        .fetch_time_logs(&TimeLogQuery::default())
        .await?;
    let task_id = session
        .reconciler
        .store()
        .time_logs
        .get(log_id)
        .map(|log| log.task_id);
    if let Some(task_id) = task_id {
        session.reconciler.fetch_task(task_id).await?;
    }
    Ok(task_id)
}

pub async fn add(
    session: &Session,
    task_id: i64,
    hours: f64,
    date: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let user_id = session.current_user()?.id;
    let payload = NewTimeLog {
        task_id,
        user_id: Some(user_id),
        hours,
        description: description.map(str::to_string),
        date: parse_optional_date(date)?.unwrap_or_else(|| Utc::now().date_naive()),
    };
    payload.validate()?;

    session.reconciler.fetch_task(task_id).await?;

    let log = session.reconciler.create_time_log(&payload).await?;
    println!("Logged {}h on task #{} ({})", log.hours, log.task_id, log.date);
    report_total(session, task_id);
    Ok(())
}

pub async fn list(
    session: &Session,
    task_id: Option<i64>,
    mine: bool,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let query = TimeLogQuery {
        task_id,
        user_id: if mine { Some(session.current_user()?.id) } else { None },
        start_date: parse_optional_date(from)?,
        end_date: parse_optional_date(to)?,
    };
    session.reconciler.fetch_time_logs(&query).await?;

    let store = session.reconciler.store();
    if store.time_logs.is_empty() {
        println!("No time logged.");
        return Ok(());
    }

    for log in store.time_logs.iter() {
        println!(
            "#{:<4} {} task #{:<4} {:>6}h {}",
            log.id,
            log.date,
            log.task_id,
            log.hours,
            truncate(log.description.as_deref().unwrap_or(""), 40)
        );
    }

    let total: f64 = store.time_logs.iter().map(|log| log.hours).sum();
    println!("Total: {}h", total);
    Ok(())
}

pub async fn edit(
    session: &Session,
    id: i64,
    hours: Option<f64>,
    description: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    session.current_user()?;
    let changes = TimeLogChanges {
        hours,
        description: description.map(str::to_string),
        date: parse_optional_date(date)?,
    };
    changes.validate()?;

    let task_id = load_task_of_log(session, id).await?;
    let log = session.reconciler.update_time_log(id, &changes).await?;
    println!("Updated time log #{} ({}h)", log.id, log.hours);
    if let Some(task_id) = task_id {
        report_total(session, task_id);
    }
    Ok(())
}

pub async fn delete(session: &Session, id: i64, force: bool) -> Result<()> {
    session.current_user()?;
    if !force && !confirm(&format!("Delete time log #{}?", id))? {
        println!("Cancelled.");
        return Ok(());
    }

    let task_id = load_task_of_log(session, id).await?;
    session.reconciler.delete_time_log(id).await?;
    println!("Deleted time log #{}", id);
    if let Some(task_id) = task_id {
        report_total(session, task_id);
    }
    Ok(())
}

pub async fn summary(session: &Session, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let user = session.current_user()?;
    let range = DateRange {
        start: parse_optional_date(from)?,
        end: parse_optional_date(to)?,
    };

    session
        .reconciler
        .fetch_time_logs(&TimeLogQuery {
            user_id: Some(user.id),
            start_date: range.start,
            end_date: range.end,
            ..Default::default()
        })
        .await?;
    session.reconciler.fetch_tasks(&TaskQuery::default()).await?;

    let store = session.reconciler.store();
    let summary = time_summary(user.id, store.time_logs.all(), store.tasks.all(), range);

    println!("Time logged by {}: {}h", user.username, summary.total_hours);
    for entry in &summary.tasks {
        let title = entry
            .task_title
            .clone()
            .unwrap_or_else(|| "(unknown task)".to_string());
        println!(
            "  #{:<4} {:<40} {:>6}h",
            entry.task_id,
            truncate(&title, 40),
            entry.hours
        );
    }

    Ok(())
}
