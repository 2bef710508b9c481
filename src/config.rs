//! Configuration module.

use serde::Deserialize;
use std::path::Path;

use crate::{ForumError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/forum.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Color console output.
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/forum.log".to_string()
}

fn default_ansi() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            ansi: default_ansi(),
        }
    }
}

/// Limits applied to posts and the subject prefix used for replies.
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// Maximum subject length in characters.
    #[serde(default = "default_max_subject_length")]
    pub max_subject_length: usize,
    /// Maximum body length in characters.
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,
    /// Maximum author display name length in characters.
    #[serde(default = "default_max_author_name_length")]
    pub max_author_name_length: usize,
    /// Prefix prepended to the thread subject for replies.
    #[serde(default = "default_reply_prefix")]
    pub reply_prefix: String,
}

fn default_max_subject_length() -> usize {
    60
}

fn default_max_body_length() -> usize {
    6000
}

fn default_max_author_name_length() -> usize {
    40
}

fn default_reply_prefix() -> String {
    "Re: ".to_string()
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            max_subject_length: default_max_subject_length(),
            max_body_length: default_max_body_length(),
            max_author_name_length: default_max_author_name_length(),
            reply_prefix: default_reply_prefix(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Post limits.
    #[serde(default)]
    pub forum: ForumConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ForumError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ForumError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FORUM_DB_PATH`: Override the database path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FORUM_DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(ForumError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        let limits = [
            ("forum.max_subject_length", self.forum.max_subject_length),
            ("forum.max_body_length", self.forum.max_body_length),
            (
                "forum.max_author_name_length",
                self.forum.max_author_name_length,
            ),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ForumError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}
