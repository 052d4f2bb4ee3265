use anyhow::{bail, Result};
use std::collections::HashMap;

use taskdeck::models::{CommentChanges, CommentParent, CommentQuery, NewComment};

use super::{confirm, Session};

/// Build the parent from the `--task` / `--project` pair.
pub fn parent(task: Option<i64>, project: Option<i64>) -> Result<CommentParent> {
    match (task, project) {
        (Some(id), None) => Ok(CommentParent::Task(id)),
        (None, Some(id)) => Ok(CommentParent::Project(id)),
        (Some(_), Some(_)) => bail!("A comment belongs to a task or a project, not both"),
        (None, None) => bail!("Pass --task or --project"),
    }
}

pub async fn add(session: &Session, parent: CommentParent, content: &str) -> Result<()> {
    let author = session.current_user()?;
    let payload = NewComment {
        content: content.to_string(),
        user_id: author.id,
        parent,
    };

    let comment = session.reconciler.create_comment(&payload).await?;
    println!("Added comment #{} to {}", comment.id, comment.parent);
    Ok(())
}

pub async fn list(session: &Session, parent: Option<CommentParent>) -> Result<()> {
    let query = match parent {
        Some(CommentParent::Task(id)) => CommentQuery::Task(id),
        Some(CommentParent::Project(id)) => CommentQuery::Project(id),
        None => CommentQuery::All,
    };
    session.reconciler.fetch_comments(&query).await?;

    let authors: HashMap<i64, String> = session
        .db()
        .list_users()?
        .into_iter()
        .map(|user| (user.id, user.username))
        .collect();

    let store = session.reconciler.store();
    if store.comments.is_empty() {
        println!("No comments.");
        return Ok(());
    }

    for comment in store.comments.iter() {
        let author = authors
            .get(&comment.user_id)
            .cloned()
            .unwrap_or_else(|| format!("user #{}", comment.user_id));
        println!(
            "#{:<4} [{}] {} on {}: {}",
            comment.id,
            comment.created_at.format("%Y-%m-%d %H:%M"),
            author,
            comment.parent,
            comment.content
        );
    }

    Ok(())
}

pub async fn edit(session: &Session, id: i64, content: &str) -> Result<()> {
    session.current_user()?;
    let changes = CommentChanges {
        content: content.to_string(),
    };
    let comment = session.reconciler.update_comment(id, &changes).await?;
    println!("Updated comment #{}", comment.id);
    Ok(())
}

pub async fn delete(session: &Session, id: i64, force: bool) -> Result<()> {
    session.current_user()?;
    if !force && !confirm(&format!("Delete comment #{}?", id))? {
        println!("Cancelled.");
        return Ok(());
    }

    session.reconciler.delete_comment(id).await?;
    println!("Deleted comment #{}", id);
    Ok(())
}
