// src/lib.rs

//! rpm-divert
//!
//! Diverts files owned by one package so that another package can install
//! its own version without a file conflict.
//!
//! # Architecture
//!
//! - Diversions: move a file aside, optionally replacing it with a symlink
//!   or a copy; apply/unapply are idempotent and check before mutating
//! - Packages: own the diversions they declared, one per source path
//! - Database: a single JSON file, locked for each load-mutate-save cycle
//!   and written back atomically
//! - Commands: a closed set of verbs, each declaring whether it mutates

pub mod commands;
pub mod config;
pub mod db;
pub mod diversion;
mod error;
pub mod package;

pub use commands::{Command, run};
pub use config::Config;
pub use db::schema::{DiversionAction, DiversionRecord, PackageRecord};
pub use db::{Database, LockMode};
pub use diversion::Diversion;
pub use error::{Error, Result};
pub use package::Package;
