//! Failure ledger
//!
//! Items that exhaust their retries are recorded in a JSON array so a later
//! run can retry exactly those items. Every run merges its failures into the
//! existing array; earlier entries are never overwritten.

use crate::item::Item;
use crate::storage::timestamp_now;
use crate::storage::traits::StorageResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Longest error message kept in a ledger entry, in characters
pub const MAX_ERROR_CHARS: usize = 200;

/// One item that failed every attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The item exactly as it was handed to the executor
    pub item_data: Item,
    pub error: String,
    pub timestamp: String,
    pub url: String,
}

impl FailureRecord {
    pub fn new(item: Item, error: &str) -> Self {
        Self {
            url: item.url().to_string(),
            item_data: item,
            error: error.chars().take(MAX_ERROR_CHARS).collect(),
            timestamp: timestamp_now(),
        }
    }

    /// The calendar date part of the timestamp, if it has one
    pub fn date(&self) -> Option<&str> {
        self.timestamp.split_once('T').map(|(date, _)| date)
    }
}

/// JSON-array ledger of failed items
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads every entry; a missing ledger is empty
    pub fn load(&self) -> StorageResult<Vec<FailureRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends `records` after the existing entries and returns the new total
    ///
    /// An unreadable existing ledger is logged and replaced rather than
    /// blocking the new entries from being saved.
    pub fn append(&self, records: &[FailureRecord]) -> StorageResult<usize> {
        let mut all = match self.load() {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(
                    "Could not read existing ledger {}, starting a new one: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        };
        all.extend_from_slice(records);
        self.rewrite(&all)?;

        tracing::info!(
            "{} failed items recorded in {} ({} total)",
            records.len(),
            self.path.display(),
            all.len()
        );
        Ok(all.len())
    }

    /// Replaces the ledger contents with `records`
    pub fn rewrite(&self, records: &[FailureRecord]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(records)?)?;
        Ok(())
    }

    /// Deletes the ledger file; a ledger that is already gone is fine
    pub fn remove(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
