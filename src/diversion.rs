// src/diversion.rs

//! Diversions and their apply/unapply state machine
//!
//! A diversion moves the file at `source` aside to `diversion` and optionally
//! installs a replacement at `source`, either as a symlink or as a copy.
//!
//! Both transitions check their preconditions before touching the
//! filesystem. Once the first mutation has happened a failure is reported as
//! is: nothing is rolled back, and `applied` only flips after every step
//! succeeded.

use crate::db::schema::{DiversionAction, DiversionRecord};
use crate::error::{Error, Result};
use std::fmt;
use std::fs::{self, File, FileTimes};
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A single source → diversion mapping
///
/// Diversions are identified by their `source` path; a package never holds
/// two diversions for the same source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diversion {
    pub source: PathBuf,
    pub diversion: PathBuf,
    pub action: DiversionAction,
    pub replacement: Option<PathBuf>,
    applied: bool,
}

impl Diversion {
    /// Create a new, unapplied diversion
    pub fn new(
        source: PathBuf,
        diversion: PathBuf,
        action: DiversionAction,
        replacement: Option<PathBuf>,
    ) -> Self {
        Self {
            source,
            diversion,
            action,
            replacement,
            applied: false,
        }
    }

    /// Rebuild a diversion from its persisted record
    pub fn from_record(record: DiversionRecord) -> Self {
        Self {
            source: record.source,
            diversion: record.diversion,
            action: record.action,
            replacement: record.replacement,
            applied: record.applied,
        }
    }

    /// Dump the diversion into its persisted record
    pub fn dump(&self) -> DiversionRecord {
        DiversionRecord {
            action: self.action,
            applied: self.applied,
            diversion: self.diversion.clone(),
            replacement: self.replacement.clone(),
            source: self.source.clone(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Check that the definition is usable
    ///
    /// Every path must be absolute, the diversion must differ from the
    /// source, and a replacement must be given exactly when the action
    /// installs one.
    pub fn validate(&self) -> Result<()> {
        for (what, path) in [("source", &self.source), ("diversion", &self.diversion)] {
            if !path.is_absolute() {
                return Err(Error::InvalidDiversion(format!(
                    "{} path {} is not absolute",
                    what,
                    path.display()
                )));
            }
        }

        if self.source == self.diversion {
            return Err(Error::InvalidDiversion(format!(
                "{} cannot be diverted onto itself",
                self.source.display()
            )));
        }

        match (&self.replacement, self.action.needs_replacement()) {
            (None, true) => Err(Error::InvalidDiversion(format!(
                "action '{}' requires a replacement",
                self.action
            ))),
            (Some(_), false) => Err(Error::InvalidDiversion(format!(
                "action '{}' does not take a replacement",
                self.action
            ))),
            (Some(replacement), true) if !replacement.is_absolute() => {
                Err(Error::InvalidDiversion(format!(
                    "replacement path {} is not absolute",
                    replacement.display()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply the diversion
    ///
    /// Does nothing if the diversion is already applied.
    ///
    /// # Arguments
    ///
    /// * `create_directory` - create the parent directory of the diversion
    ///   path (and its ancestors) when it is missing
    pub fn apply(&mut self, create_directory: bool) -> Result<()> {
        if self.applied {
            debug!("{} is already applied", self);
            return Ok(());
        }

        let diversion_dir = self
            .diversion
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| self.apply_error("diversion path has no parent directory"))?;

        info!(
            "Diverting {} to {}",
            self.source.display(),
            self.diversion.display()
        );

        if create_directory && !diversion_dir.exists() {
            fs::create_dir_all(&diversion_dir).map_err(|e| {
                self.apply_error(format!(
                    "failed to create {}: {}",
                    diversion_dir.display(),
                    e
                ))
            })?;
        }

        self.check_apply(&diversion_dir)?;

        fs::rename(&self.source, &self.diversion).map_err(|e| {
            self.apply_error(format!(
                "failed to move {} to {}: {}",
                self.source.display(),
                self.diversion.display(),
                e
            ))
        })?;

        match (self.action, &self.replacement) {
            (DiversionAction::Symlink, Some(replacement)) => {
                info!(
                    "Symlinking {} to {}",
                    replacement.display(),
                    self.source.display()
                );
                self.link_replacement(replacement)?;
            }
            (DiversionAction::Copy, Some(replacement)) => {
                info!(
                    "Copying {} to {}",
                    replacement.display(),
                    self.source.display()
                );
                copy_with_metadata(replacement, &self.source).map_err(|e| {
                    self.apply_error(format!(
                        "failed to copy {}: {}",
                        replacement.display(),
                        e
                    ))
                })?;
            }
            _ => {}
        }

        self.applied = true;
        Ok(())
    }

    /// Unapply the diversion, restoring the original file at `source`
    ///
    /// Does nothing if the diversion is not applied.
    ///
    /// When the action is `nothing` and both paths exist, rpm has already
    /// installed a new copy of the file at `source` (it installs files before
    /// running the triggers that unapply diversions). In that case the stale
    /// diverted file is removed and `source` is left alone.
    pub fn unapply(&mut self) -> Result<()> {
        if !self.applied {
            debug!("{} is not applied", self);
            return Ok(());
        }

        info!(
            "Restoring diversion {} to {}",
            self.diversion.display(),
            self.source.display()
        );

        let source_exists = path_exists(&self.source);
        let diversion_exists = path_exists(&self.diversion);

        if self.action == DiversionAction::Nothing && source_exists && diversion_exists {
            warn!(
                "Diversion source {} already exists, removing old diversion {} and marking as unapplied",
                self.source.display(),
                self.diversion.display()
            );
            fs::remove_file(&self.diversion).map_err(|e| {
                self.unapply_error(format!(
                    "failed to remove {}: {}",
                    self.diversion.display(),
                    e
                ))
            })?;
            self.applied = false;
            return Ok(());
        }

        let replaced = self.action.needs_replacement();
        if replaced && !source_exists {
            return Err(self.unapply_error("safety checks failed: replacement at source is missing"));
        }
        if !replaced && source_exists {
            return Err(self.unapply_error("safety checks failed: source already exists"));
        }
        if !diversion_exists {
            return Err(self.unapply_error("safety checks failed: diverted file is missing"));
        }

        if replaced {
            info!("Removing replacement {}", self.source.display());
            fs::remove_file(&self.source).map_err(|e| {
                self.unapply_error(format!(
                    "failed to remove {}: {}",
                    self.source.display(),
                    e
                ))
            })?;
        }

        fs::rename(&self.diversion, &self.source).map_err(|e| {
            self.unapply_error(format!(
                "failed to move {} to {}: {}",
                self.diversion.display(),
                self.source.display(),
                e
            ))
        })?;

        self.applied = false;
        Ok(())
    }

    /// Preconditions of `apply`; nothing has been touched when this fails
    fn check_apply(&self, diversion_dir: &Path) -> Result<()> {
        if !path_exists(&self.source) {
            return Err(self.apply_error("safety checks failed: source does not exist"));
        }
        if path_exists(&self.diversion) {
            return Err(self.apply_error("safety checks failed: diversion path already exists"));
        }
        if !diversion_dir.is_dir() {
            return Err(self.apply_error(format!(
                "safety checks failed: {} is not a directory",
                diversion_dir.display()
            )));
        }

        if self.action.needs_replacement() {
            match &self.replacement {
                None => {
                    return Err(self.apply_error(format!(
                        "safety checks failed: action '{}' has no replacement",
                        self.action
                    )));
                }
                // Follow the link: a dangling replacement has no content to install
                Some(replacement) if fs::metadata(replacement).is_err() => {
                    return Err(self.apply_error(format!(
                        "safety checks failed: replacement {} does not exist",
                        replacement.display()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Symlink `source` to `replacement` and give the replacement the
    /// permission bits of the diverted original
    fn link_replacement(&self, replacement: &Path) -> Result<()> {
        symlink(replacement, &self.source).map_err(|e| {
            self.apply_error(format!(
                "failed to symlink {}: {}",
                replacement.display(),
                e
            ))
        })?;

        copy_mode(&self.diversion, &self.source).map_err(|e| {
            self.apply_error(format!(
                "failed to copy permissions of {} to {}: {}",
                self.diversion.display(),
                replacement.display(),
                e
            ))
        })
    }

    fn apply_error(&self, reason: impl Into<String>) -> Error {
        Error::Apply {
            path: self.source.clone(),
            reason: reason.into(),
        }
    }

    fn unapply_error(&self, reason: impl Into<String>) -> Error {
        Error::Unapply {
            path: self.source.clone(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Diversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.source.display(),
            self.diversion.display()
        )
    }
}

/// Whether something exists at `path`, without following a final symlink
fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copy the permission bits of `from` onto `to`, following symlinks
fn copy_mode(from: &Path, to: &Path) -> io::Result<()> {
    let permissions = fs::metadata(from)?.permissions();
    fs::set_permissions(to, permissions)
}

/// Copy contents, permission bits and access/modification times
fn copy_with_metadata(from: &Path, to: &Path) -> io::Result<()> {
    let mut input = File::open(from)?;
    let metadata = input.metadata()?;

    let mut output = File::create(to)?;
    io::copy(&mut input, &mut output)?;

    // Times first, through the writable handle; the copied mode may be read-only
    output.set_times(
        FileTimes::new()
            .set_accessed(metadata.accessed()?)
            .set_modified(metadata.modified()?),
    )?;
    output.set_permissions(metadata.permissions())
}
