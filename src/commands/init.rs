use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use taskdeck::config::{load_config_from_file, save_config_to_file, Config, DEFAULT_CONFIG};
use taskdeck::db::Database;

use super::{CONFIG_FILE, DB_FILE};

/// Set up `.taskdeck` under `path`. `default_user` is recorded in
/// config.json; on an existing setup it is the only thing changed.
pub fn run(path: &Path, force: bool, default_user: Option<&str>) -> Result<()> {
    let taskdeck_dir = path.join(".taskdeck");
    let config_path = taskdeck_dir.join(CONFIG_FILE);

    let dir_exists = taskdeck_dir.exists();
    if dir_exists && config_path.exists() && !force {
        if let Some(username) = default_user {
            let mut config = load_config_from_file(&config_path);
            config.default_user = Some(username.to_string());
            save_config_to_file(&config, &config_path).context("Failed to write config.json")?;
            println!("Default user is now {}", username);
            return Ok(());
        }
        println!("Already initialized at {}", path.display());
        println!("Use --force to reset config.json to the defaults.");
        return Ok(());
    }

    if !dir_exists {
        fs::create_dir_all(&taskdeck_dir).context("Failed to create .taskdeck directory")?;
    }

    // Opening creates the schema
    Database::open(&taskdeck_dir.join(DB_FILE))?;

    match default_user {
        Some(username) => {
            let config = Config {
                default_user: Some(username.to_string()),
                ..Config::default()
            };
            save_config_to_file(&config, &config_path).context("Failed to write config.json")?;
        }
        None => fs::write(&config_path, DEFAULT_CONFIG).context("Failed to write config.json")?,
    }

    if dir_exists {
        println!("Reset {}", config_path.display());
    } else {
        println!("Created {}", taskdeck_dir.display());
        println!("Next: 'taskdeck user add <username> <full name>'");
    }

    Ok(())
}
