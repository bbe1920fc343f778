// src/db/mod.rs

//! Diversion database
//!
//! The database is a JSON file holding every package and its diversions
//! (see [`schema`]). It is loaded once per invocation and written back once
//! after a mutating command.
//!
//! - `open` takes an advisory lock on `<path>.lock` for the lifetime of the
//!   returned `Database`, so concurrent invocations cannot interleave their
//!   load-mutate-save cycles
//! - `save` writes a temp file next to the database and renames it into
//!   place, so a crash mid-write never leaves a truncated database behind

pub mod schema;

use crate::diversion::Diversion;
use crate::error::{Error, Result};
use crate::package::Package;
use schema::PackageRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Permission bits of the persisted database
const DATABASE_MODE: u32 = 0o644;

/// How `Database::open` locks the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers share the lock; skipped when there is nothing to read yet
    Shared,
    /// Held by a single writer; creates the database directory if needed
    Exclusive,
}

/// All known packages, indexed by name
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    packages: BTreeMap<String, Package>,
    // Lock on `<path>.lock`, released when the database is dropped
    _lock: Option<File>,
}

impl Database {
    /// Create an empty, unlocked database backed by `path`
    ///
    /// Nothing is read from disk; see [`Database::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            packages: BTreeMap::new(),
            _lock: None,
        }
    }

    /// Lock and load the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the database file
    /// * `mode` - Shared for read-only commands, exclusive for everything else
    ///
    /// # Returns
    ///
    /// * `Result<Database>` - The loaded database, or `Error::DatabaseLocked`
    ///   if another process holds a conflicting lock
    pub fn open(path: impl Into<PathBuf>, mode: LockMode) -> Result<Self> {
        let mut db = Self::new(path);
        db._lock = acquire_lock(&db.path, mode)?;
        db.load()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory state with the contents of the database file
    ///
    /// A missing file is not an error: there is simply nothing diverted yet.
    pub fn load(&mut self) -> Result<()> {
        self.packages.clear();

        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Diversion database {} doesn't exist", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<PackageRecord> =
            serde_json::from_slice(&contents).map_err(|e| Error::DatabaseLoad {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        for record in records {
            let package = Package::from_record(record);
            if self.packages.contains_key(&package.name) {
                warn!(
                    "Package {} appears more than once in {}, keeping the last entry",
                    package.name,
                    self.path.display()
                );
            }
            self.packages.insert(package.name.clone(), package);
        }

        debug!(
            "Loaded {} package(s) from {}",
            self.packages.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Get the package called `name`, creating an empty one if needed
    pub fn lookup_or_create(&mut self, name: &str) -> &mut Package {
        self.packages
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name.to_string()))
    }

    /// Remove a package entry
    pub fn remove(&mut self, name: &str) -> Option<Package> {
        self.packages.remove(name)
    }

    /// Drop every package that no longer owns a diversion
    pub fn prune(&mut self) {
        self.packages.retain(|name, package| {
            if package.is_empty() {
                debug!("Pruning empty package {}", name);
            }
            !package.is_empty()
        });
    }

    /// Diversions of one package, or of every package when `name` is `None`
    ///
    /// Unknown package names yield an empty map; nothing is created.
    pub fn query_diversions(&self, name: Option<&str>) -> BTreeMap<&str, Vec<&Diversion>> {
        self.packages
            .iter()
            .filter(|(package_name, _)| name.is_none_or(|n| n == package_name.as_str()))
            .map(|(package_name, package)| {
                (package_name.as_str(), package.diversions().collect())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Dump every package into its persisted record
    pub fn dump(&self) -> Vec<PackageRecord> {
        self.packages.values().map(Package::dump).collect()
    }

    /// Write the database back to disk
    pub fn save(&self) -> Result<()> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir)?;

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.dump().serialize(&mut serializer)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&buffer)?;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(DATABASE_MODE))?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!(
            "Saved {} package(s) to {}",
            self.packages.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Directory holding `path`, `.` for bare file names
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Path of the lock file guarding the database at `path`
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("diversions"));
    name.push(".lock");
    path.with_file_name(name)
}

fn acquire_lock(path: &Path, mode: LockMode) -> Result<Option<File>> {
    let lock_path = lock_path(path);

    let file = match mode {
        LockMode::Shared => match File::open(&lock_path) {
            Ok(file) => file,
            // Nobody has written the database yet
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No lock file at {}, reading unlocked", lock_path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        },
        LockMode::Exclusive => {
            fs::create_dir_all(parent_dir(path))?;
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?
        }
    };

    let result = match mode {
        LockMode::Shared => file.try_lock_shared(),
        LockMode::Exclusive => file.try_lock(),
    };

    match result {
        Ok(()) => {
            debug!("Locked {} ({:?})", lock_path.display(), mode);
            Ok(Some(file))
        }
        Err(TryLockError::WouldBlock) => Err(Error::DatabaseLocked(path.to_path_buf())),
        Err(TryLockError::Error(e)) => Err(e.into()),
    }
}
