// src/package.rs

//! Packages group the diversions they own, keyed by source path

use crate::db::schema::PackageRecord;
use crate::diversion::Diversion;
use std::collections::BTreeMap;
use std::collections::btree_map::Values;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A named owner of diversions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    diversions: BTreeMap<PathBuf, Diversion>,
}

impl Package {
    /// Create a new package without diversions
    pub fn new(name: String) -> Self {
        Self {
            name,
            diversions: BTreeMap::new(),
        }
    }

    /// Rebuild a package from its persisted record
    ///
    /// If the record lists the same source twice, the later entry wins.
    pub fn from_record(record: PackageRecord) -> Self {
        let mut package = Self::new(record.package);

        for diversion in record.diversions {
            if let Some(previous) = package.insert(Diversion::from_record(diversion)) {
                warn!(
                    "Package {} lists {} more than once, keeping the last entry",
                    package.name,
                    previous.source.display()
                );
            }
        }

        package
    }

    /// Dump the package into its persisted record, diversions sorted by source
    pub fn dump(&self) -> PackageRecord {
        PackageRecord {
            diversions: self.diversions.values().map(Diversion::dump).collect(),
            package: self.name.clone(),
        }
    }

    /// Insert a diversion, replacing any diversion with the same source
    ///
    /// Returns the replaced diversion, if there was one.
    pub fn insert(&mut self, diversion: Diversion) -> Option<Diversion> {
        self.diversions.insert(diversion.source.clone(), diversion)
    }

    pub fn get(&self, source: &Path) -> Option<&Diversion> {
        self.diversions.get(source)
    }

    pub fn get_mut(&mut self, source: &Path) -> Option<&mut Diversion> {
        self.diversions.get_mut(source)
    }

    /// Remove the diversion for `source`, whatever its state
    pub fn remove_diversion(&mut self, source: &Path) -> Option<Diversion> {
        self.diversions.remove(source)
    }

    /// Iterate over the diversions in source order
    pub fn diversions(&self) -> Values<'_, PathBuf, Diversion> {
        self.diversions.values()
    }

    /// Source paths of every diversion, in order
    pub fn sources(&self) -> Vec<PathBuf> {
        self.diversions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.diversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diversions.is_empty()
    }
}
