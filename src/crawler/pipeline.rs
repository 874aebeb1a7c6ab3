//! End-to-end scrape run
//!
//! Walks the configured listing, writes the listing CSV, then optionally
//! enriches every product from its detail page.

use crate::browser::SessionFactory;
use crate::config::{output_path, product_type_from_url, Config, DetailMode, OutputKind};
use crate::crawler::executor::{
    close_quietly, ExecutionReport, ExecutorOptions, ParallelExecutor, DEFAULT_CLOSE_TIMEOUT,
};
use crate::crawler::pagination::{AutoResume, PaginationWalker, ResumeDecider, WalkOptions};
use crate::crawler::sequential::SequentialExecutor;
use crate::extract::{DetailExtractor, ListingExtractor};
use crate::item::Item;
use crate::output::{DetailTotals, RunSummary};
use crate::state::{ProgressStore, WalkState};
use crate::storage::{ColumnSchema, CsvBatchSink};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-invocation choices that do not live in the config file
pub struct RunOptions {
    /// Discard saved pagination progress before walking
    pub fresh: bool,
    /// Asked whether saved progress should be picked up
    pub decider: Box<dyn ResumeDecider>,
    /// Ends the listing walk early; progress is kept for the next run
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            fresh: false,
            decider: Box::new(AutoResume(true)),
            cancel: CancellationToken::new(),
        }
    }
}

/// Runs a complete scrape as described by `config`
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `factory` - Source of browser sessions for the walk and the workers
/// * `options` - Resume and cancellation handling
///
/// # Returns
///
/// * `Ok(RunSummary)` - The walk finished or was interrupted
/// * `Err(ScraperError)` - The walk could not run or the listing CSV could
///   not be written
pub async fn run_scrape(
    config: &Config,
    factory: Arc<dyn SessionFactory>,
    options: RunOptions,
) -> Result<RunSummary> {
    let started = Instant::now();
    let category_url = config.scraper.category_url.clone();
    let product_type = product_type_from_url(&category_url);

    tracing::info!("Scraping category '{}' from {}", product_type, category_url);

    let mut walker =
        PaginationWalker::new(ListingExtractor::new(), WalkOptions::from_config(config))
            .with_resume_decider(options.decider)
            .with_cancellation(options.cancel.clone());

    if config.scraper.enable_resume {
        let store = ProgressStore::new(output_path(config, OutputKind::Progress));
        if options.fresh {
            tracing::info!("Discarding saved progress");
            if let Err(e) = store.clear() {
                tracing::warn!("Failed to clear saved progress: {}", e);
            }
        }
        walker = walker.with_progress_store(store);
    }

    let mut session = factory.create_session(config.browser.headless).await?;
    let walked = walker.walk(session.as_mut(), &category_url).await;
    close_quietly(session, DEFAULT_CLOSE_TIMEOUT).await;
    let outcome = walked?;

    let products = outcome.items.len();
    let basic_file = write_listing(config, &product_type, &outcome.items)?;

    let mut details = None;
    let mut complete_file = None;
    if config.scraper.scrape_details && products > 0 {
        if outcome.state == WalkState::Interrupted {
            tracing::warn!("Listing walk was interrupted, skipping detail pages");
        } else {
            let (totals, path) = enrich(config, factory, outcome.items, &product_type).await?;
            details = Some(totals);
            complete_file = Some(path);
        }
    }

    Ok(RunSummary {
        category_url,
        product_type,
        walk_state: outcome.state,
        pages_scraped: outcome.pages_scraped,
        resumed_from: outcome.resumed_from,
        products,
        basic_file,
        details,
        complete_file,
        failure_ledger: Some(output_path(config, OutputKind::Failed)),
        elapsed: started.elapsed(),
    })
}

/// Writes the listing-only CSV, returning its path when anything was written
fn write_listing(config: &Config, product_type: &str, items: &[Item]) -> Result<Option<PathBuf>> {
    if items.is_empty() {
        tracing::warn!("No products found, nothing to save");
        return Ok(None);
    }

    let path = if config.scraper.max_pages == Some(1) {
        output_path(config, OutputKind::Basic)
    } else {
        output_path(config, OutputKind::MultiPage { product_type })
    };

    let mut sink = CsvBatchSink::new(&path, ColumnSchema::Basic);
    sink.write_all(items)?;
    tracing::info!("Saved {} products to {}", items.len(), path.display());
    Ok(Some(path))
}

/// Scrapes detail pages, streaming completed batches to the complete CSV
async fn enrich(
    config: &Config,
    factory: Arc<dyn SessionFactory>,
    items: Vec<Item>,
    product_type: &str,
) -> Result<(DetailTotals, PathBuf)> {
    let options = ExecutorOptions::from_config(config);
    let path = output_path(config, OutputKind::Complete);
    let mut sink = CsvBatchSink::new(&path, ColumnSchema::Complete);
    let extractor = DetailExtractor::new().with_product_type(product_type);

    let report = match config.scraper.detail_mode {
        DetailMode::Parallel => {
            ParallelExecutor::new(factory)
                .run(items, Arc::new(extractor), &options, Some(&mut sink))
                .await
        }
        DetailMode::Sequential => {
            SequentialExecutor::new(factory)
                .run(items, &extractor, &options, Some(&mut sink))
                .await?
        }
    };

    Ok((totals(&report), path))
}

fn totals(report: &ExecutionReport) -> DetailTotals {
    DetailTotals {
        scheduled: report.total(),
        succeeded: report.succeeded,
        failed: report.failed,
        skipped: report.passthrough.len(),
        newly_recorded_failures: report.failures.len(),
        batches: report.batches,
    }
}
