pub mod comment;
pub mod dashboard;
pub mod export;
pub mod init;
pub mod project;
pub mod task;
pub mod timelog;
pub mod user;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::io::{self, Write};
use std::path::Path;

use taskdeck::config::{load_config_from_file, Config};
use taskdeck::db::Database;
use taskdeck::models::User;
use taskdeck::reconciler::Reconciler;

pub const DB_FILE: &str = "taskdeck.db";
pub const CONFIG_FILE: &str = "config.json";

/// Everything a command needs: the reconciler over the local backend, the
/// loaded config and whoever is acting.
pub struct Session {
    pub reconciler: Reconciler<Database>,
    pub config: Config,
    pub user: Option<User>,
}

impl Session {
    /// Open the database and config under `taskdeck_dir` and resolve the
    /// acting user: `username` first, then the config's `default_user`.
    /// The backend answers on that user's behalf.
    pub fn open(taskdeck_dir: &Path, username: Option<&str>) -> Result<Self> {
        let db = Database::open(&taskdeck_dir.join(DB_FILE)).context("Failed to open database")?;
        let config = load_config_from_file(&taskdeck_dir.join(CONFIG_FILE));

        let username = username
            .map(str::to_string)
            .or_else(|| config.default_user.clone());
        let user = match username {
            Some(name) => match db.user_by_username(&name)? {
                Some(user) => Some(user),
                None => bail!("Unknown user '{}'. Add it with 'taskdeck user add {}'.", name, name),
            },
            None => None,
        };

        let db = match &user {
            Some(user) => db.acting_as(user.id),
            None => db,
        };

        Ok(Self {
            reconciler: Reconciler::new(db),
            config,
            user,
        })
    }

    pub fn db(&self) -> &Database {
        self.reconciler.gateway()
    }

    pub fn current_user(&self) -> Result<&User> {
        match &self.user {
            Some(user) => Ok(user),
            None => bail!(
                "No current user. Pass --user, set TASKDECK_USER, \
                 or set default_user in .taskdeck/config.json."
            ),
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

pub fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(parse_date).transpose()
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", truncated)
    }
}

/// Ask a yes/no question on stdin; anything but `y` is a no.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("29/02/2024").is_err());
        assert_eq!(parse_optional_date(None).unwrap(), None);
    }

    #[test]
    fn test_session_resolves_user() {
        let (session, _dir) = testing::session();
        assert_eq!(session.current_user().unwrap().username, "alice");
    }

    #[test]
    fn test_session_rejects_unknown_user() {
        let dir = tempdir().unwrap();
        assert!(Session::open(dir.path(), Some("mallory")).is_err());
    }

    #[test]
    fn test_session_without_user() {
        let dir = tempdir().unwrap();
        let session = Session::open(dir.path(), None).unwrap();
        assert!(session.current_user().is_err());
    }

    #[test]
    fn test_session_uses_config_default_user() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join(DB_FILE)).unwrap();
        db.create_user("bob", "Bob").unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "default_user": "bob" }"#).unwrap();

        let session = Session::open(dir.path(), None).unwrap();
        assert_eq!(session.current_user().unwrap().username, "bob");
    }
}
