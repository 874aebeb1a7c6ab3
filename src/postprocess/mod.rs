//! Post-processing of the complete CSV
//!
//! Two optional steps run on a finished scrape:
//! - Translating the text columns through a chat-completions API
//! - Re-hosting product images on an image host and rewriting their URLs
//!
//! Both leave a cell untouched when its request keeps failing, so the output
//! always has every row of the input.

mod images;
mod translate;

pub use images::{
    process_csv_images, process_table_images, EasyImageHost, ImageHost, ImageOptions,
    ImageProcessor, ImageReport,
};
pub use translate::{
    translate_csv, translate_table, ChatTranslator, TranslateOptions, TranslateReport, Translator,
};

use crate::storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to every post-processing request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised by post-processing
#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("No {0} configured")]
    MissingSetting(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for post-processing operations
pub type PostprocessResult<T> = Result<T, PostprocessError>;
