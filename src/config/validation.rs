use crate::config::types::{
    BrowserConfig, Config, ImagesConfig, OutputConfig, ScraperConfig, TranslateConfig,
};
use crate::ConfigError;
use url::Url;

/// Longest pre-request delay accepted, in seconds
const MAX_REQUEST_DELAY_SECS: f64 = 3600.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_browser_config(&config.browser)?;
    validate_scraper_config(&config.scraper)?;
    validate_output_config(&config.output)?;
    validate_translate_config(&config.translate)?;
    validate_images_config(&config.images)?;
    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.page_load_timeout == 0 {
        return Err(ConfigError::Validation(
            "page_load_timeout must be at least 1 second".to_string(),
        ));
    }

    if config.script_timeout == 0 {
        return Err(ConfigError::Validation(
            "script_timeout must be at least 1 second".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates scraping behaviour configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    validate_category_url(&config.category_url)?;

    if config.max_workers < 1 || config.max_workers > config.max_workers_limit {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and {}, got {}",
            config.max_workers_limit, config.max_workers
        )));
    }

    if config.retry_times < 1 {
        return Err(ConfigError::Validation(
            "retry_times must be >= 1".to_string(),
        ));
    }

    for (name, value) in [
        ("request_delay_min", config.request_delay_min),
        ("request_delay_max", config.request_delay_max),
    ] {
        if !(0.0..=MAX_REQUEST_DELAY_SECS).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 0 and {} seconds, got {}",
                name, MAX_REQUEST_DELAY_SECS, value
            )));
        }
    }

    if config.request_delay_min > config.request_delay_max {
        return Err(ConfigError::Validation(format!(
            "request_delay_min ({}) must not exceed request_delay_max ({})",
            config.request_delay_min, config.request_delay_max
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates the listing URL the crawl starts from
fn validate_category_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid category_url '{}': {}", raw, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "category_url '{}' must use http or https",
            raw
        )));
    }

    Ok(())
}

/// Validates translation settings
fn validate_translate_config(config: &TranslateConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid translate base-url '{}': {}", config.base_url, e))
    })?;

    if config.workers < 1 {
        return Err(ConfigError::Validation(
            "translate workers must be >= 1".to_string(),
        ));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "translate max_retries must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates image hosting settings
fn validate_images_config(config: &ImagesConfig) -> Result<(), ConfigError> {
    if let Some(api_url) = &config.api_url {
        Url::parse(api_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid images api-url '{}': {}", api_url, e))
        })?;
    }

    if config.image_column.is_empty() {
        return Err(ConfigError::Validation(
            "images image_column cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("directory", &config.directory),
        ("basic_file", &config.basic_file),
        ("complete_file", &config.complete_file),
        ("failed_file", &config.failed_file),
        ("progress_file", &config.progress_file),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!(
                "output {} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper_config() -> ScraperConfig {
        toml::from_str(r#"category-url = "https://www.hollandandbarrett.com/shop/vitamins-supplements/""#)
            .unwrap()
    }

    #[test]
    fn test_validate_category_url() {
        assert!(validate_category_url("https://www.hollandandbarrett.com/shop/").is_ok());
        assert!(validate_category_url("http://localhost:8080/shop/").is_ok());

        assert!(validate_category_url("").is_err());
        assert!(validate_category_url("not a url").is_err());
        assert!(validate_category_url("ftp://example.com/shop/").is_err());
    }

    #[test]
    fn test_default_scraper_config_is_valid() {
        assert!(validate_scraper_config(&scraper_config()).is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = scraper_config();
        config.max_workers = 0;
        assert!(validate_scraper_config(&config).is_err());

        config.max_workers = config.max_workers_limit + 1;
        assert!(validate_scraper_config(&config).is_err());

        config.max_workers = config.max_workers_limit;
        assert!(validate_scraper_config(&config).is_ok());
    }

    #[test]
    fn test_delay_range_order() {
        let mut config = scraper_config();
        config.request_delay_min = 5.0;
        config.request_delay_max = 1.0;
        assert!(validate_scraper_config(&config).is_err());

        config.request_delay_min = 0.0;
        config.request_delay_max = 0.0;
        assert!(validate_scraper_config(&config).is_ok());
    }

    #[test]
    fn test_non_finite_delays_rejected() {
        for bad in [f64::INFINITY, f64::NAN, -1.0, 1e300] {
            let mut config = scraper_config();
            config.request_delay_max = bad;
            assert!(validate_scraper_config(&config).is_err(), "accepted {}", bad);

            let mut config = scraper_config();
            config.request_delay_min = bad;
            assert!(validate_scraper_config(&config).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = scraper_config();
        config.retry_times = 0;
        assert!(validate_scraper_config(&config).is_err());
    }

    #[test]
    fn test_translate_bounds() {
        let mut config = TranslateConfig::default();
        assert!(validate_translate_config(&config).is_ok());

        config.workers = 0;
        assert!(validate_translate_config(&config).is_err());

        let config = TranslateConfig {
            base_url: "not a url".to_string(),
            ..TranslateConfig::default()
        };
        assert!(validate_translate_config(&config).is_err());
    }

    #[test]
    fn test_images_api_url_must_parse() {
        let config = ImagesConfig {
            api_url: Some("::".to_string()),
            ..ImagesConfig::default()
        };
        assert!(validate_images_config(&config).is_err());
        assert!(validate_images_config(&ImagesConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_output_name_rejected() {
        let config = OutputConfig {
            failed_file: String::new(),
            ..OutputConfig::default()
        };
        assert!(validate_output_config(&config).is_err());
    }
}
