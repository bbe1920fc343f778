// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for rpm-divert
#[derive(Error, Debug)]
pub enum Error {
    /// A diversion could not be applied (safety check or filesystem failure)
    #[error("Unable to apply diversion of {}: {reason}", .path.display())]
    Apply { path: PathBuf, reason: String },

    /// A diversion could not be unapplied (safety check or filesystem failure)
    #[error("Unable to unapply diversion of {}: {reason}", .path.display())]
    Unapply { path: PathBuf, reason: String },

    /// No package with this name is known
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// The package has no diversion for the given source
    #[error("Package {package} has no diversion for {}", .source_path.display())]
    DiversionNotFound {
        package: String,
        source_path: PathBuf,
    },

    /// Tried to remove or replace a diversion that is still applied
    #[error("Diversion of {} in package {package} is still applied", .source_path.display())]
    StillApplied {
        package: String,
        source_path: PathBuf,
    },

    /// The persisted database is malformed
    #[error("Failed to load diversion database {}: {reason}", .path.display())]
    DatabaseLoad { path: PathBuf, reason: String },

    /// Another invocation holds the database lock
    #[error("Diversion database is locked by another process: {}", .0.display())]
    DatabaseLocked(PathBuf),

    /// A diversion definition is not usable
    #[error("Invalid diversion: {0}")]
    InvalidDiversion(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using rpm-divert's Error type
pub type Result<T> = std::result::Result<T, Error>;
