// src/commands.rs

//! Command layer
//!
//! Every verb of the command line is a [`Command`] variant. Commands run
//! against a locked [`Database`]; [`run`] saves the database afterwards for
//! every command that [mutates](Command::mutates) it, even when the command
//! itself failed.

use crate::config::Config;
use crate::db::schema::DiversionAction;
use crate::db::{Database, LockMode};
use crate::diversion::Diversion;
use crate::error::{Error, Result};
use crate::package::Package;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A single invocation of rpm-divert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record a new diversion (or redefine an unapplied one)
    Add {
        package: String,
        source: PathBuf,
        diversion: PathBuf,
        action: DiversionAction,
        replacement: Option<PathBuf>,
    },
    /// Forget an unapplied diversion
    Remove { package: String, source: PathBuf },
    /// Apply one diversion, or every diversion of the package
    Apply {
        package: String,
        source: Option<PathBuf>,
        create_directory: bool,
    },
    /// Unapply one diversion, or every diversion of the package
    Unapply {
        package: String,
        source: Option<PathBuf>,
    },
    /// Print diversions
    List { package: Option<String> },
}

impl Command {
    /// Whether the command changes the database and must save it
    pub fn mutates(&self) -> bool {
        match self {
            Command::Add { .. }
            | Command::Remove { .. }
            | Command::Apply { .. }
            | Command::Unapply { .. } => true,
            Command::List { .. } => false,
        }
    }

    /// Run the command against an already loaded database
    ///
    /// Human-readable output goes to `out`.
    pub fn execute(&self, db: &mut Database, out: &mut dyn Write) -> Result<()> {
        match self {
            Command::Add {
                package,
                source,
                diversion,
                action,
                replacement,
            } => add(
                db,
                package,
                Diversion::new(source.clone(), diversion.clone(), *action, replacement.clone()),
            ),
            Command::Remove { package, source } => remove(db, package, source),
            Command::Apply {
                package,
                source,
                create_directory,
            } => apply(db, package, source.as_deref(), *create_directory),
            Command::Unapply { package, source } => unapply(db, package, source.as_deref()),
            Command::List { package } => list(db, package.as_deref(), out),
        }
    }
}

/// Open the database, execute `command`, and save if the command mutates
///
/// When both the command and the save fail, the command's error is returned
/// and the save error is logged.
pub fn run(config: &Config, command: &Command, out: &mut dyn Write) -> Result<()> {
    let mode = if command.mutates() {
        LockMode::Exclusive
    } else {
        LockMode::Shared
    };
    let mut db = Database::open(&config.database_path, mode)?;

    let result = command.execute(&mut db, out);
    if !command.mutates() {
        return result;
    }

    db.prune();
    let saved = db.save();

    match (result, saved) {
        (Err(e), Err(save_error)) => {
            error!(
                "Failed to save diversion database {}: {}",
                db.path().display(),
                save_error
            );
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), saved) => saved,
    }
}

fn add(db: &mut Database, package: &str, diversion: Diversion) -> Result<()> {
    diversion.validate()?;

    let pkg = db.lookup_or_create(package);
    if pkg
        .get(&diversion.source)
        .is_some_and(Diversion::is_applied)
    {
        return Err(still_applied(package, &diversion.source));
    }

    info!("Adding diversion {} to package {}", diversion, package);
    if let Some(previous) = pkg.insert(diversion) {
        info!("Replaced previous diversion {}", previous);
    }
    Ok(())
}

fn remove(db: &mut Database, package: &str, source: &Path) -> Result<()> {
    let pkg = db.lookup_or_create(package);

    let result = match pkg.get(source).map(Diversion::is_applied) {
        None => Err(not_found(package, source)),
        Some(true) => Err(still_applied(package, source)),
        Some(false) => {
            pkg.remove_diversion(source);
            info!(
                "Removed diversion of {} from package {}",
                source.display(),
                package
            );
            Ok(())
        }
    };

    if pkg.is_empty() {
        db.remove(package);
    }

    result
}

fn apply(
    db: &mut Database,
    package: &str,
    source: Option<&Path>,
    create_directory: bool,
) -> Result<()> {
    let pkg = db.lookup_or_create(package);

    for source in targets(pkg, package, source)? {
        if let Some(diversion) = pkg.get_mut(&source) {
            diversion.apply(create_directory)?;
        }
    }
    Ok(())
}

fn unapply(db: &mut Database, package: &str, source: Option<&Path>) -> Result<()> {
    let pkg = db.lookup_or_create(package);

    for source in targets(pkg, package, source)? {
        if let Some(diversion) = pkg.get_mut(&source) {
            diversion.unapply()?;
        }
    }
    Ok(())
}

fn list(db: &Database, package: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let diversions = db.query_diversions(package);

    if diversions.is_empty() {
        writeln!(out, "No diversions found.")?;
        return Ok(());
    }

    for (name, diversions) in &diversions {
        writeln!(out, "{}:", name)?;
        for diversion in diversions {
            write!(out, "    {}", diversion)?;
            if let Some(replacement) = &diversion.replacement {
                write!(out, " [{}: {}]", diversion.action, replacement.display())?;
            }
            let state = if diversion.is_applied() {
                "applied"
            } else {
                "not applied"
            };
            writeln!(out, " ({})", state)?;
        }
    }

    Ok(())
}

/// Sources a command should act on: the given one, or all of them in order
fn targets(pkg: &Package, package: &str, source: Option<&Path>) -> Result<Vec<PathBuf>> {
    match source {
        Some(source) if pkg.get(source).is_some() => Ok(vec![source.to_path_buf()]),
        Some(source) => Err(not_found(package, source)),
        None if pkg.is_empty() => Err(Error::PackageNotFound(package.to_string())),
        None => Ok(pkg.sources()),
    }
}

fn not_found(package: &str, source: &Path) -> Error {
    Error::DiversionNotFound {
        package: package.to_string(),
        source_path: source.to_path_buf(),
    }
}

fn still_applied(package: &str, source: &Path) -> Error {
    Error::StillApplied {
        package: package.to_string(),
        source_path: source.to_path_buf(),
    }
}
