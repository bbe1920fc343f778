// src/db/schema.rs

//! On-disk schema of the diversion database
//!
//! The database is a JSON array with one object per package:
//!
//! ```json
//! [
//!     {
//!         "diversions": [
//!             {
//!                 "action": "symlink",
//!                 "applied": true,
//!                 "diversion": "/usr/bin/hello-diverted",
//!                 "replacement": "/usr/lib/hello-custom/hello",
//!                 "source": "/usr/bin/hello"
//!             }
//!         ],
//!         "package": "hello-custom"
//!     }
//! ]
//! ```
//!
//! Fields are declared in alphabetical order so that serialized records come
//! out key-sorted. Unknown keys are rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// What ends up at the source path once a diversion is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiversionAction {
    /// Move the original aside and leave the source path empty
    #[default]
    Nothing,
    /// Symlink the source path to the replacement
    Symlink,
    /// Copy the replacement onto the source path
    Copy,
}

impl DiversionAction {
    pub fn as_str(&self) -> &str {
        match self {
            DiversionAction::Nothing => "nothing",
            DiversionAction::Symlink => "symlink",
            DiversionAction::Copy => "copy",
        }
    }

    /// Whether this action installs something from `replacement`
    pub fn needs_replacement(&self) -> bool {
        !matches!(self, DiversionAction::Nothing)
    }
}

impl fmt::Display for DiversionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiversionAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(DiversionAction::Nothing),
            "symlink" => Ok(DiversionAction::Symlink),
            "copy" => Ok(DiversionAction::Copy),
            _ => Err(format!("Invalid diversion action: {}", s)),
        }
    }
}

/// Persisted form of a single diversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiversionRecord {
    #[serde(default)]
    pub action: DiversionAction,
    #[serde(default)]
    pub applied: bool,
    pub diversion: PathBuf,
    #[serde(default)]
    pub replacement: Option<PathBuf>,
    pub source: PathBuf,
}

/// Persisted form of a package and its diversions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageRecord {
    #[serde(default)]
    pub diversions: Vec<DiversionRecord>,
    pub package: String,
}
