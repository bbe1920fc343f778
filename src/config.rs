// src/config.rs

//! Process-wide settings
//!
//! There is no configuration file: the binary builds a `Config` from its
//! global command-line options and hands it to the database and command
//! layer.

use std::path::PathBuf;

/// Default location of the diversion database
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/rpm-divert/diversions";

/// Default log verbosity when `RUST_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Location of the persisted diversion database
    pub database_path: PathBuf,
    /// `tracing` filter directive used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Config {
    pub fn new(database_path: impl Into<PathBuf>, log_level: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            log_level: log_level.into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_PATH, DEFAULT_LOG_LEVEL)
    }
}
