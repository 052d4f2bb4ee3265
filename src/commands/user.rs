use anyhow::Result;

use taskdeck::db::Database;

pub fn add(db: &Database, username: &str, full_name: &str) -> Result<()> {
    let user = db.create_user(username, full_name)?;
    println!("Added user #{} {} ({})", user.id, user.username, user.full_name);
    Ok(())
}

pub fn list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users. Add one with 'taskdeck user add'.");
        return Ok(());
    }

    for user in users {
        println!("#{:<4} {:<16} {}", user.id, user.username, user.full_name);
    }

    Ok(())
}
