use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub images: ImagesConfig,
}

/// How long navigation blocks before returning control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageLoadStrategy {
    /// Wait until every resource has loaded
    Normal,
    /// Wait until the DOM is ready
    #[default]
    Eager,
    /// Return as soon as navigation is committed
    None,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Run Chrome without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Navigation blocking behaviour
    #[serde(default)]
    pub page_load_strategy: PageLoadStrategy,

    /// Navigation timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub page_load_timeout: u64,

    /// Script evaluation timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub script_timeout: u64,

    /// Identification string sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional command-line switches passed to Chrome
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Path to the Chrome executable; auto-detected when absent
    #[serde(default)]
    pub executable: Option<String>,
}

/// Scraping behaviour configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Category listing to start from
    pub category_url: String,

    /// Number of concurrent detail workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Upper bound accepted for `max-workers`
    #[serde(default = "default_max_workers_limit")]
    pub max_workers_limit: usize,

    /// Attempts per detail page before recording a failure
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Lower bound of the random pre-request delay (seconds)
    #[serde(default = "default_request_delay_min")]
    pub request_delay_min: f64,

    /// Upper bound of the random pre-request delay (seconds)
    #[serde(default = "default_request_delay_max")]
    pub request_delay_max: f64,

    /// Completed items written per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cap on detail pages scraped; all when absent
    #[serde(default)]
    pub max_products: Option<usize>,

    /// Cap on listing pages walked; all when absent
    #[serde(default)]
    pub max_pages: Option<u32>,

    /// Persist pagination progress for resuming
    #[serde(default = "default_true")]
    pub enable_resume: bool,

    /// Accept saved progress without asking
    #[serde(default = "default_true")]
    pub auto_resume: bool,

    /// Politeness delay between listing pages (milliseconds)
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Whether detail pages are scraped at all
    #[serde(default)]
    pub scrape_details: bool,

    /// Parallel or sequential detail scraping
    #[serde(default)]
    pub detail_mode: DetailMode,
}

/// Detail scraping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetailMode {
    Sequential,
    #[default]
    Parallel,
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding every output file
    #[serde(default = "default_output_dir")]
    pub directory: String,

    /// Listing-only CSV file name
    #[serde(default = "default_basic_file")]
    pub basic_file: String,

    /// Enriched CSV file name
    #[serde(default = "default_complete_file")]
    pub complete_file: String,

    /// Failure ledger file name
    #[serde(default = "default_failed_file")]
    pub failed_file: String,

    /// Pagination progress file name
    #[serde(default = "default_progress_file")]
    pub progress_file: String,
}

/// Log file configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily log files; console only when absent
    #[serde(default)]
    pub directory: Option<String>,
}

/// Translation of the complete CSV through a chat-completions API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TranslateConfig {
    /// API root; `/chat/completions` is appended
    #[serde(default = "default_translate_base_url")]
    pub base_url: String,

    /// API key; `OPENAI_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_translate_model")]
    pub model: String,

    /// Language the text columns are translated into
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Columns translated; all others are copied unchanged
    #[serde(default = "default_translate_columns")]
    pub columns: Vec<String>,

    /// Concurrent translation requests
    #[serde(default = "default_translate_workers")]
    pub workers: usize,

    /// Attempts per cell before the original text is kept
    #[serde(default = "default_translate_retries")]
    pub max_retries: u32,

    /// Minimum spacing between request starts (milliseconds)
    #[serde(default = "default_translate_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Pause before retrying a failed cell (milliseconds)
    #[serde(default = "default_translate_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Cells shorter than this many characters are left as they are
    #[serde(default = "default_translate_min_length")]
    pub min_length: usize,
}

/// Re-hosting of product images on an image host
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImagesConfig {
    /// Upload endpoint; image processing is unavailable when absent
    #[serde(default)]
    pub api_url: Option<String>,

    /// Upload token; `IMAGE_API_TOKEN` takes precedence
    #[serde(default)]
    pub token: Option<String>,

    /// Column holding the image URL
    #[serde(default = "default_image_column")]
    pub image_column: String,

    /// Column used to name uploaded files
    #[serde(default = "default_name_column")]
    pub name_column: String,

    /// Pause after each upload (milliseconds)
    #[serde(default = "default_image_delay_ms")]
    pub request_delay_ms: u64,
}

impl TranslateConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl ImagesConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var("IMAGE_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .or_else(|| self.token.clone())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl BrowserConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout)
    }
}

impl ScraperConfig {
    /// The random pre-request delay range
    ///
    /// Values that are not a valid duration count as no delay.
    pub fn delay_range(&self) -> (Duration, Duration) {
        let secs = |value: f64| Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO);
        (secs(self.request_delay_min), secs(self.request_delay_max))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            page_load_strategy: PageLoadStrategy::default(),
            page_load_timeout: default_timeout_secs(),
            script_timeout: default_timeout_secs(),
            user_agent: default_user_agent(),
            extra_args: Vec::new(),
            executable: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            basic_file: default_basic_file(),
            complete_file: default_complete_file(),
            failed_file: default_failed_file(),
            progress_file: default_progress_file(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            base_url: default_translate_base_url(),
            api_key: None,
            model: default_translate_model(),
            target_language: default_target_language(),
            columns: default_translate_columns(),
            workers: default_translate_workers(),
            max_retries: default_translate_retries(),
            request_delay_ms: default_translate_request_delay_ms(),
            retry_delay_ms: default_translate_retry_delay_ms(),
            min_length: default_translate_min_length(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            image_column: default_image_column(),
            name_column: default_name_column(),
            request_delay_ms: default_image_delay_ms(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_max_workers() -> usize {
    3
}

fn default_max_workers_limit() -> usize {
    10
}

fn default_retry_times() -> u32 {
    3
}

fn default_request_delay_min() -> f64 {
    2.0
}

fn default_request_delay_max() -> f64 {
    4.0
}

fn default_batch_size() -> usize {
    100
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_output_dir() -> String {
    "data/output".to_string()
}

fn default_basic_file() -> String {
    "products_basic.csv".to_string()
}

fn default_complete_file() -> String {
    "products_complete.csv".to_string()
}

fn default_failed_file() -> String {
    "failed_products.json".to_string()
}

fn default_progress_file() -> String {
    "scrape_progress.json".to_string()
}

fn default_translate_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_translate_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_target_language() -> String {
    "Chinese".to_string()
}

fn default_translate_columns() -> Vec<String> {
    ["产品名称", "产品亮点", "产品描述", "用法说明", "营养成分", "配料表"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_translate_workers() -> usize {
    5
}

fn default_translate_retries() -> u32 {
    3
}

fn default_translate_request_delay_ms() -> u64 {
    200
}

fn default_translate_retry_delay_ms() -> u64 {
    3000
}

fn default_translate_min_length() -> usize {
    3
}

fn default_image_column() -> String {
    "产品图".to_string()
}

fn default_name_column() -> String {
    "产品名称".to_string()
}

fn default_image_delay_ms() -> u64 {
    500
}
