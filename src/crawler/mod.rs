//! Crawler module for listing walks and detail scraping
//!
//! This module contains the core scraping logic, including:
//! - Walking paginated listings with resumable progress
//! - Enriching items on a bounded pool of browser sessions
//! - Retrying items recorded in the failure ledger
//! - Overall run coordination

mod executor;
mod pagination;
pub mod pipeline;
mod retry;
mod sequential;

pub use executor::{ExecutionReport, ExecutorOptions, ParallelExecutor};
pub use pagination::{
    current_page_number, has_next_page, page_number_from_url, with_page_param, AutoResume,
    PaginationWalker, ResumeDecider, WalkOptions, WalkOutcome, NEXT_SELECTOR,
};
pub use pipeline::{run_scrape, RunOptions};
pub use retry::{retry_failed, retry_failed_with, retry_options, RetryReport, RETRY_ATTEMPTS};
pub use sequential::SequentialExecutor;
