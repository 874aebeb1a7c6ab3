//! Output module for reporting scrape results
//!
//! This module handles:
//! - The end-of-run summary printed after a scrape
//! - Statistics over the failure ledger

pub mod failures;
mod summary;

pub use failures::{
    classify_error, format_failure_summary, print_failure_summary, summarize_failures, ErrorKind,
    FailureStatistics,
};
pub use summary::{format_run_summary, print_run_summary, DetailTotals, RunSummary};
