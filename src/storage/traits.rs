//! Storage traits and error types
//!
//! This module defines the sink interface batches are written through and
//! the error type shared by every file-backed store.

use crate::item::Item;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for completed items, written one batch at a time
///
/// Batches arrive in completion order with 1-based numbers. The first batch
/// starts a fresh output; later batches extend it.
pub trait BatchSink: Send {
    /// Persists one batch
    ///
    /// # Arguments
    ///
    /// * `items` - The items completed since the previous batch
    /// * `batch_number` - 1-based batch counter
    /// * `is_first` - True when this batch should replace any earlier output
    fn write_batch(&mut self, items: &[Item], batch_number: usize, is_first: bool)
        -> StorageResult<()>;
}
