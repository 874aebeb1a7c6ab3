use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Output files the scraper writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind<'a> {
    /// Listing-only CSV
    Basic,
    /// Enriched CSV
    Complete,
    /// Failure ledger
    Failed,
    /// Pagination progress checkpoint
    Progress,
    /// Per-category CSV written by multi-page runs
    MultiPage { product_type: &'a str },
    /// Successes from a retry-failed run
    RetrySuccess,
    /// The complete CSV with its text columns translated
    Translated,
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use hb_scraper::config::load_config;
///
/// let config = load_config(Path::new("hb_scraper.toml")).unwrap();
/// println!("Workers: {}", config.scraper.max_workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Resolves the path of an output file inside the configured output directory
pub fn output_path(config: &Config, kind: OutputKind<'_>) -> PathBuf {
    let dir = Path::new(&config.output.directory);
    match kind {
        OutputKind::Basic => dir.join(&config.output.basic_file),
        OutputKind::Complete => dir.join(&config.output.complete_file),
        OutputKind::Failed => dir.join(&config.output.failed_file),
        OutputKind::Progress => dir.join(&config.output.progress_file),
        OutputKind::MultiPage { product_type } => {
            dir.join(format!("products_multi_page_{}.csv", product_type))
        }
        OutputKind::RetrySuccess => dir.join("retry_success.csv"),
        OutputKind::Translated => {
            with_file_suffix(&dir.join(&config.output.complete_file), "_zh")
        }
    }
}

/// Inserts `suffix` between a file's stem and its extension
///
/// `out/products.csv` with suffix `_zh` becomes `out/products_zh.csv`.
pub fn with_file_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    path.with_file_name(name)
}

/// Extracts the product category from a listing URL
///
/// The category is the path segment following `/shop/`; `"unknown"` is
/// returned when the URL has no such segment.
pub fn product_type_from_url(url: &str) -> String {
    url.split_once("/shop/")
        .and_then(|(_, rest)| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DetailMode, PageLoadStrategy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[browser]
headless = false
page-load-strategy = "normal"
page-load-timeout = 30

[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/condition/hair-skin-nails/"
max-workers = 4
retry-times = 2
request-delay-min = 1.0
request-delay-max = 3.0
batch-size = 50
max-products = 20
detail-mode = "sequential"

[output]
directory = "./out"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert!(!config.browser.headless);
        assert_eq!(config.browser.page_load_strategy, PageLoadStrategy::Normal);
        assert_eq!(config.browser.page_load_timeout, 30);
        assert_eq!(config.browser.script_timeout, 60);
        assert_eq!(config.scraper.max_workers, 4);
        assert_eq!(config.scraper.max_products, Some(20));
        assert_eq!(config.scraper.detail_mode, DetailMode::Sequential);
        assert_eq!(config.output.directory, "./out");
        assert_eq!(config.output.basic_file, "products_basic.csv");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(
            r#"
[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/"
"#,
        )
        .unwrap();

        assert!(config.browser.headless);
        assert_eq!(config.browser.page_load_strategy, PageLoadStrategy::Eager);
        assert_eq!(config.scraper.max_workers, 3);
        assert_eq!(config.scraper.retry_times, 3);
        assert_eq!(config.scraper.batch_size, 100);
        assert_eq!(config.scraper.max_pages, None);
        assert!(config.scraper.enable_resume);
        assert_eq!(config.scraper.detail_mode, DetailMode::Parallel);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/scraper.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let result = parse_config(
            r#"
[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/"
max-workers = 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_infinite_delay_rejected() {
        for value in ["inf", "nan"] {
            let result = parse_config(&format!(
                r#"
[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/"
request-delay-max = {}
"#,
                value
            ));
            assert!(matches!(result, Err(ConfigError::Validation(_))), "{}", value);
        }
    }

    #[test]
    fn test_output_paths() {
        let config = parse_config(
            r#"
[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/"

[output]
directory = "out"
"#,
        )
        .unwrap();

        assert_eq!(
            output_path(&config, OutputKind::Failed),
            Path::new("out/failed_products.json")
        );
        assert_eq!(
            output_path(&config, OutputKind::Translated),
            Path::new("out/products_complete_zh.csv")
        );
        assert_eq!(
            output_path(
                &config,
                OutputKind::MultiPage {
                    product_type: "vitamins-supplements"
                }
            ),
            Path::new("out/products_multi_page_vitamins-supplements.csv")
        );
    }

    #[test]
    fn test_with_file_suffix() {
        assert_eq!(
            with_file_suffix(Path::new("out/products_zh.csv"), "_processed"),
            Path::new("out/products_zh_processed.csv")
        );
        assert_eq!(
            with_file_suffix(Path::new("products"), "_zh"),
            Path::new("products_zh")
        );
    }

    #[test]
    fn test_post_processing_defaults() {
        let config = parse_config(
            r#"
[scraper]
category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/"

[images]
api-url = "https://img.test/api/index.php"
"#,
        )
        .unwrap();

        assert_eq!(config.translate.model, "gpt-4o-mini");
        assert!(config.translate.columns.iter().any(|c| c == "配料表"));
        assert_eq!(config.images.image_column, "产品图");
        assert_eq!(
            config.images.api_url.as_deref(),
            Some("https://img.test/api/index.php")
        );
    }

    #[test]
    fn test_product_type_from_url() {
        assert_eq!(
            product_type_from_url(
                "https://www.hollandandbarrett.com/shop/vitamins-supplements/condition/hair-skin-nails/"
            ),
            "vitamins-supplements"
        );
        assert_eq!(product_type_from_url("https://example.com/category/"), "unknown");
        assert_eq!(product_type_from_url("https://example.com/shop/"), "unknown");
    }
}
