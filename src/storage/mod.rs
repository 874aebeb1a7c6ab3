//! Storage module for persisting scrape results
//!
//! This module handles every file the scraper writes, including:
//! - Product CSVs, written in batches as items complete
//! - The failure ledger of items that exhausted their retries
//! - Whole CSV tables rewritten by post-processing

mod csv_sink;
mod ledger;
mod table;
mod traits;

pub use csv_sink::{ColumnSchema, CsvBatchSink};
pub use ledger::{FailureLedger, FailureRecord, MAX_ERROR_CHARS};
pub use table::CsvTable;
pub use traits::{BatchSink, StorageError, StorageResult};

/// Local wall-clock time in ISO 8601 form, as written into persisted records
pub fn timestamp_now() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
