//! Retrying items recorded in the failure ledger

use crate::browser::SessionFactory;
use crate::config::{output_path, product_type_from_url, Config, OutputKind};
use crate::crawler::executor::{ExecutorOptions, ParallelExecutor};
use crate::extract::DetailExtractor;
use crate::item::Item;
use crate::storage::{ColumnSchema, CsvBatchSink, FailureLedger, FailureRecord};
use crate::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Attempts per item when retrying; higher than a normal run
pub const RETRY_ATTEMPTS: u32 = 5;

/// Outcome of a retry run
#[derive(Debug, Clone, PartialEq)]
pub struct RetryReport {
    /// Ledger entries that were retried
    pub attempted: usize,
    pub recovered: usize,
    /// Entries left in the ledger afterwards
    pub still_failed: usize,
    /// Where the recovered items were written
    pub success_file: Option<PathBuf>,
    pub ledger: PathBuf,
}

/// Executor settings for a retry run: more attempts, longer pauses, no ledger
///
/// Failures are reconciled against the existing ledger afterwards rather than
/// appended to it.
pub fn retry_options(config: &Config, workers: Option<usize>) -> ExecutorOptions {
    ExecutorOptions {
        max_workers: workers.unwrap_or(config.scraper.max_workers),
        max_items: None,
        retry_times: RETRY_ATTEMPTS,
        delay_range: (Duration::from_secs(3), Duration::from_secs(6)),
        batch_size: None,
        headless: config.browser.headless,
        retry_cooldown: Duration::from_secs(2),
        failure_ledger: None,
        ..ExecutorOptions::default()
    }
}

/// Re-scrapes every item in the failure ledger
pub async fn retry_failed(
    config: &Config,
    factory: Arc<dyn SessionFactory>,
    workers: Option<usize>,
) -> Result<RetryReport> {
    retry_failed_with(config, factory, &retry_options(config, workers)).await
}

/// Re-scrapes every item in the failure ledger with explicit executor settings
///
/// Recovered items are written to the retry CSV. The ledger is rewritten to
/// hold only the entries that failed again, or removed when none did.
pub async fn retry_failed_with(
    config: &Config,
    factory: Arc<dyn SessionFactory>,
    options: &ExecutorOptions,
) -> Result<RetryReport> {
    let ledger = FailureLedger::new(output_path(config, OutputKind::Failed));
    let records = ledger.load()?;

    let mut report = RetryReport {
        attempted: records.len(),
        recovered: 0,
        still_failed: records.len(),
        success_file: None,
        ledger: ledger.path().to_path_buf(),
    };

    if records.is_empty() {
        tracing::info!("No failed products to retry");
        return Ok(report);
    }

    tracing::info!("Retrying {} failed products", records.len());

    let items: Vec<Item> = records.iter().map(|r| r.item_data.clone()).collect();
    let extractor = DetailExtractor::new()
        .with_product_type(product_type_from_url(&config.scraper.category_url));

    let outcome = ParallelExecutor::new(factory)
        .run(items, Arc::new(extractor), options, None)
        .await;

    let recovered: Vec<Item> = outcome
        .items
        .into_iter()
        .filter(|item| item.is_enriched())
        .collect();
    let remaining = still_failed(records, &recovered);

    report.recovered = recovered.len();
    report.still_failed = remaining.len();

    if remaining.is_empty() {
        ledger.remove()?;
        tracing::info!("Every failed product recovered, removed {}", ledger.path().display());
    } else {
        ledger.rewrite(&remaining)?;
        tracing::info!(
            "{} products still failing, kept in {}",
            remaining.len(),
            ledger.path().display()
        );
    }

    if !recovered.is_empty() {
        let path = output_path(config, OutputKind::RetrySuccess);
        CsvBatchSink::new(&path, ColumnSchema::Complete).write_all(&recovered)?;
        tracing::info!("Saved {} recovered products to {}", recovered.len(), path.display());
        report.success_file = Some(path);
    }

    Ok(report)
}

/// Ledger entries whose URL was not recovered
fn still_failed(records: Vec<FailureRecord>, recovered: &[Item]) -> Vec<FailureRecord> {
    let done: HashSet<&str> = recovered.iter().map(|item| item.url()).collect();
    records
        .into_iter()
        .filter(|record| !done.contains(record.url.as_str()))
        .collect()
}
