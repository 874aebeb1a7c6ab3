//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use hb_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hb_scraper.toml")).unwrap();
//! println!("Scraping {}", config.scraper.category_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, DetailMode, ImagesConfig, LoggingConfig, OutputConfig,
    PageLoadStrategy, ScraperConfig, TranslateConfig,
};

// Re-export parser functions
pub use parser::{
    load_config, output_path, parse_config, product_type_from_url, with_file_suffix, OutputKind,
};
pub use validation::validate;
