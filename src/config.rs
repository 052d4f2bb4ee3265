use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::views::HealthPolicy;

/// The file `init` writes into a fresh `.taskdeck/`.
pub const DEFAULT_CONFIG: &str = include_str!("../resources/config.json");

const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Username acting when neither `--user` nor `TASKDECK_USER` is set.
    pub default_user: Option<String>,
    /// How many items the dashboard's "recent" lists show.
    pub recent_limit: usize,
    pub health: HealthPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_user: None,
            recent_limit: DEFAULT_RECENT_LIMIT,
            health: HealthPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<Config>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Replace out-of-range values with their defaults.
    pub fn normalized(mut self) -> Self {
        if let Err(err) = self.health.validate() {
            tracing::warn!("Invalid health policy ({}), resetting to default", err);
            self.health = HealthPolicy::default();
        }

        if self.recent_limit == 0 {
            tracing::warn!("recent_limit must be positive, resetting to {}", DEFAULT_RECENT_LIMIT);
            self.recent_limit = DEFAULT_RECENT_LIMIT;
        }

        if matches!(self.default_user.as_deref(), Some(user) if user.trim().is_empty()) {
            self.default_user = None;
        }

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.health
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        if self.recent_limit == 0 {
            return Err(ConfigError::Validation(
                "recent_limit: must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Will always return config, falling back to defaults on missing/invalid files.
pub fn load_config_from_file(config_path: &Path) -> Config {
    match std::fs::read_to_string(config_path) {
        Ok(raw_config) => Config::from_raw(&raw_config),
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                tracing::debug!("No config file at {}, using defaults", config_path.display());
            } else {
                tracing::warn!("Failed to read config file: {}", err);
            }
            Config::default()
        }
    }
}

pub fn save_config_to_file(config: &Config, config_path: &Path) -> Result<(), ConfigError> {
    config.validate()?;
    let raw_config = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, raw_config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::HealthStatus;
    use tempfile::tempdir;

    #[test]
    fn test_bundled_default_matches_default() {
        assert_eq!(Config::from_raw(DEFAULT_CONFIG), Config::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let config = load_config_from_file(&dir.path().join("config.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_json_falls_back() {
        assert_eq!(Config::from_raw("{ not json"), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_raw(r#"{ "health": { "healthy_at": 90 } }"#);
        assert_eq!(config.health.healthy_at, 90);
        assert_eq!(config.health.warning_at, 40);
        assert_eq!(config.recent_limit, 5);
    }

    #[test]
    fn test_inverted_thresholds_reset() {
        let config = Config::from_raw(r#"{ "health": { "healthy_at": 30, "warning_at": 60 } }"#);
        assert_eq!(config.health, HealthPolicy::default());
    }

    #[test]
    fn test_blank_default_user_dropped() {
        let config = Config::from_raw(r#"{ "default_user": "  ", "recent_limit": 0 }"#);
        assert_eq!(config.default_user, None);
        assert_eq!(config.recent_limit, 5);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            default_user: Some("alice".to_string()),
            recent_limit: 3,
            health: HealthPolicy {
                overdue_cap: Some(HealthStatus::Critical),
                ..Default::default()
            },
        };
        save_config_to_file(&config, &path).unwrap();
        assert_eq!(load_config_from_file(&path), config);
    }

    #[test]
    fn test_save_rejects_invalid() {
        let dir = tempdir().unwrap();
        let config = Config {
            recent_limit: 0,
            ..Default::default()
        };
        let err = save_config_to_file(&config, &dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
