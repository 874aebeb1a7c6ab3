//! hb-scraper main entry point
//!
//! This is the command-line interface for the Holland & Barrett product scraper.

use async_trait::async_trait;
use clap::{Parser, ValueEnum};
use hb_scraper::browser::{ChromeSessionFactory, FixtureSessionFactory, SessionFactory};
use hb_scraper::config::{
    load_config, output_path, product_type_from_url, validate, with_file_suffix, Config,
    DetailMode, OutputKind,
};
use hb_scraper::crawler::{retry_failed, run_scrape, AutoResume, ResumeDecider, RunOptions};
use hb_scraper::extract::DetailExtractor;
use hb_scraper::logging::init_logging;
use hb_scraper::output::{print_failure_summary, print_run_summary, summarize_failures};
use hb_scraper::postprocess::{
    process_csv_images, translate_csv, ChatTranslator, EasyImageHost, ImageOptions,
    ImageProcessor, TranslateOptions,
};
use hb_scraper::storage::FailureLedger;
use hb_scraper::CrawlProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Pages walked by `--mode limited` when no page count is given
const DEFAULT_LIMITED_PAGES: u32 = 5;

/// How many listing pages to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// The first page only
    Single,
    /// Every page until the listing ends
    All,
    /// A fixed number of pages (see --max-pages)
    Limited,
}

/// hb-scraper: a product scraper for the Holland & Barrett storefront
///
/// Walks a category listing page by page in a real browser, optionally
/// enriches every product from its detail page on a pool of browser
/// sessions, and writes the results to CSV.
#[derive(Parser, Debug)]
#[command(name = "hb-scraper")]
#[command(version = "1.0.0")]
#[command(about = "Holland & Barrett product scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "hb_scraper.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// How many listing pages to walk
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Listing page limit
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Scrape product detail pages
    #[arg(long, conflicts_with = "no_details")]
    details: bool,

    /// Only scrape listing pages
    #[arg(long)]
    no_details: bool,

    /// Scrape detail pages one at a time in a single browser
    #[arg(long)]
    sequential: bool,

    /// Number of concurrent detail workers
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Scrape details for at most N products
    #[arg(long, value_name = "N")]
    max_products: Option<usize>,

    /// Ignore saved pagination progress
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the plan without scraping
    #[arg(long, conflicts_with_all = ["failed_summary", "retry_failed", "check_network", "translate", "process_images"])]
    dry_run: bool,

    /// Summarise the failure ledger and exit
    #[arg(long, conflicts_with_all = ["retry_failed", "check_network", "translate", "process_images"])]
    failed_summary: bool,

    /// Re-scrape the products recorded in the failure ledger
    #[arg(long, conflicts_with_all = ["check_network", "translate", "process_images"])]
    retry_failed: bool,

    /// Check connectivity to the site and exit
    #[arg(long, conflicts_with_all = ["translate", "process_images"])]
    check_network: bool,

    /// Translate the complete CSV's text columns into a new CSV
    #[arg(long)]
    translate: bool,

    /// Re-host product images of the complete and translated CSVs
    #[arg(long)]
    process_images: bool,

    /// Extract detail fields from a saved product page and print them as JSON
    #[arg(long, value_name = "HTML")]
    extract_file: Option<PathBuf>,
}

/// Asks on the terminal whether to continue from saved progress
struct PromptResume;

#[async_trait]
impl ResumeDecider for PromptResume {
    async fn should_resume(&self, progress: &CrawlProgress) -> bool {
        let question = format!(
            "Saved progress found: {} pages, {} products (saved {}). Resume? [Y/n] ",
            progress.pages_scraped, progress.total_products, progress.timestamp
        );
        let mut stdout = tokio::io::stdout();
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err()
        {
            return true;
        }

        let mut answer = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut answer).await {
            Ok(0) | Err(_) => true,
            Ok(_) => !matches!(answer.trim().to_lowercase().as_str(), "n" | "no"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(path) = &cli.extract_file {
        let _guard = init_logging(cli.verbose, cli.quiet, None);
        return handle_extract_file(path).await;
    }

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration {}: {}", cli.config.display(), e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &cli)?;

    let log_dir = config.logging.directory.clone();
    let _guard = init_logging(cli.verbose, cli.quiet, log_dir.as_deref().map(Path::new));
    tracing::info!("Configuration loaded from {}", cli.config.display());

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.failed_summary {
        handle_failed_summary(&config)?;
    } else if cli.check_network {
        handle_check_network(&config).await?;
    } else if cli.retry_failed {
        handle_retry_failed(&config, cli.workers).await?;
    } else if cli.translate || cli.process_images {
        if cli.translate {
            handle_translate(&config).await?;
        }
        if cli.process_images {
            handle_process_images(&config).await?;
        }
    } else {
        handle_scrape(&config, cli.fresh).await?;
    }

    Ok(())
}

/// Applies command-line flags on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let scraper = &mut config.scraper;

    match cli.mode {
        Some(Mode::Single) => scraper.max_pages = Some(1),
        Some(Mode::All) => scraper.max_pages = None,
        Some(Mode::Limited) => {
            scraper.max_pages = cli
                .max_pages
                .or(scraper.max_pages)
                .or(Some(DEFAULT_LIMITED_PAGES))
        }
        None => {
            if cli.max_pages.is_some() {
                scraper.max_pages = cli.max_pages;
            }
        }
    }

    if cli.details {
        scraper.scrape_details = true;
    }
    if cli.no_details {
        scraper.scrape_details = false;
    }
    if cli.sequential {
        scraper.detail_mode = DetailMode::Sequential;
    }
    if let Some(workers) = cli.workers {
        scraper.max_workers = workers;
    }
    if cli.max_products.is_some() {
        scraper.max_products = cli.max_products;
    }

    validate(config)?;
    Ok(())
}

/// Handles --dry-run: shows what a run would do
fn handle_dry_run(config: &Config) {
    let scraper = &config.scraper;
    println!("=== hb-scraper Dry Run ===\n");

    println!("Listing:");
    println!("  Category URL: {}", scraper.category_url);
    println!("  Product type: {}", product_type_from_url(&scraper.category_url));
    println!(
        "  Pages: {}",
        scraper
            .max_pages
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string())
    );
    println!("  Page delay: {}ms", scraper.page_delay_ms);
    println!(
        "  Resume: {} (auto: {})",
        scraper.enable_resume, scraper.auto_resume
    );

    println!("\nDetails:");
    if scraper.scrape_details {
        println!("  Mode: {:?}", scraper.detail_mode);
        println!("  Workers: {}", scraper.max_workers);
        println!("  Retries per product: {}", scraper.retry_times);
        println!(
            "  Request delay: {:.1}-{:.1}s",
            scraper.request_delay_min, scraper.request_delay_max
        );
        println!("  Batch size: {}", scraper.batch_size);
        println!(
            "  Product limit: {}",
            scraper
                .max_products
                .map(|n| n.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    } else {
        println!("  Disabled");
    }

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!("  Page load strategy: {:?}", config.browser.page_load_strategy);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Failure ledger: {}", output_path(config, OutputKind::Failed).display());
    println!("  Progress file: {}", output_path(config, OutputKind::Progress).display());

    println!("\nPost-processing:");
    println!(
        "  Translate: {} via {} ({} columns)",
        config.translate.model,
        config.translate.base_url,
        config.translate.columns.len()
    );
    println!(
        "  Image host: {}",
        config.images.api_url.as_deref().unwrap_or("not configured")
    );

    println!("\n✓ Configuration is valid");
}

/// Handles --failed-summary: groups the ledger by date and error kind
fn handle_failed_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FailureLedger::new(output_path(config, OutputKind::Failed));
    let records = ledger.load()?;
    if records.is_empty() {
        println!("No failed products recorded in {}", ledger.path().display());
        return Ok(());
    }

    print_failure_summary(&summarize_failures(&records));
    println!("\nRetry them with --retry-failed");
    Ok(())
}

/// Handles --check-network
async fn handle_check_network(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = hb_scraper::diagnose::run_diagnostics(config).await?;
    println!("{}", report.format());
    Ok(())
}

/// Handles --retry-failed
async fn handle_retry_failed(
    config: &Config,
    workers: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let factory: Arc<dyn SessionFactory> =
        Arc::new(ChromeSessionFactory::new(config.browser.clone()));
    let report = retry_failed(config, factory, workers).await?;

    println!("=== Retry Summary ===\n");
    println!("  Retried: {}", report.attempted);
    println!("  Recovered: {}", report.recovered);
    println!("  Still failing: {}", report.still_failed);
    if let Some(path) = &report.success_file {
        println!("  Recovered products saved to: {}", path.display());
    }
    if report.still_failed > 0 {
        println!("  Remaining failures kept in: {}", report.ledger.display());
    }
    Ok(())
}

/// Handles --translate
async fn handle_translate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let input = output_path(config, OutputKind::Complete);
    if !input.exists() {
        return Err(format!(
            "{} does not exist; run a scrape with --details first",
            input.display()
        )
        .into());
    }
    let output = output_path(config, OutputKind::Translated);
    let translator = ChatTranslator::from_config(&config.translate)?;
    let report = translate_csv(&input, &output, &translator, &TranslateOptions::from_config(config))
        .await?;

    println!("=== Translation Summary ===\n");
    println!("  Rows: {}", report.rows);
    println!("  Columns: {}", report.columns.join(", "));
    println!("  Translated cells: {}", report.translated);
    println!("  Kept original: {}", report.failed);
    println!("  Saved to: {}", output.display());
    Ok(())
}

/// Handles --process-images
async fn handle_process_images(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let processor = ImageProcessor::new(Box::new(EasyImageHost::from_config(config)?))?;
    let options = ImageOptions::from_config(config);

    let mut processed = 0;
    for kind in [OutputKind::Complete, OutputKind::Translated] {
        let input = output_path(config, kind);
        if !input.exists() {
            tracing::info!("Skipping {}: file does not exist", input.display());
            continue;
        }
        let output = with_file_suffix(&input, "_processed");
        let report = process_csv_images(&input, &output, &processor, &options).await?;

        println!("=== Images: {} ===\n", input.display());
        println!("  Re-hosted: {}", report.rehosted);
        println!("  No image: {}", report.skipped);
        println!("  Kept original: {}", report.failed);
        println!("  Saved to: {}\n", output.display());
        processed += 1;
    }

    if processed == 0 {
        return Err("no complete or translated CSV to process".into());
    }
    Ok(())
}

/// Handles --extract-file: replays a saved product page through the detail extractor
async fn handle_extract_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (factory, url) = FixtureSessionFactory::from_file(path)?;
    let mut session = factory.session();
    let extractor = DetailExtractor::new().with_popup_settle(Duration::ZERO);

    match extractor.extract(&mut session, &url).await? {
        Some(details) => println!("{}", serde_json::to_string_pretty(&details)?),
        None => {
            tracing::error!("No product data found in {}", path.display());
            return Err(format!("no product data in {}", path.display()).into());
        }
    }
    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: &Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping the listing walk (press again to quit)");
            token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });

    let decider: Box<dyn ResumeDecider> = if config.scraper.auto_resume {
        Box::new(AutoResume(true))
    } else {
        Box::new(PromptResume)
    };
    let factory: Arc<dyn SessionFactory> =
        Arc::new(ChromeSessionFactory::new(config.browser.clone()));

    let options = RunOptions {
        fresh,
        decider,
        cancel,
    };

    match run_scrape(config, factory, options).await {
        Ok(summary) => {
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            Err(e.into())
        }
    }
}
