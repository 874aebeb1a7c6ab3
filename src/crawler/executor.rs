//! Parallel detail scraping
//!
//! This module runs one task per item, including:
//! - Rate limiting with a semaphore and a random per-task delay
//! - Retrying each item on a fresh browser session
//! - Aggregating outcomes in completion order from a single loop
//! - Flushing completed items to a batch sink
//! - Recording exhausted items in the failure ledger

use crate::browser::{BrowserSession, SessionFactory};
use crate::config::Config;
use crate::extract::DetailScraper;
use crate::item::Item;
use crate::storage::{BatchSink, FailureLedger, FailureRecord};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Completions between progress lines
const PROGRESS_EVERY: usize = 5;

/// How long a session may take to close
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs for a detail-scraping run
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Upper bound on concurrently open sessions
    pub max_workers: usize,
    /// Only the first `max_items` items are scraped; the rest pass through
    pub max_items: Option<usize>,
    /// Attempts per item, each on a fresh session
    pub retry_times: u32,
    /// Bounds of the random delay taken before an item's first attempt
    pub delay_range: (Duration, Duration),
    /// Items per batch handed to the sink; `None` disables batching
    pub batch_size: Option<usize>,
    pub headless: bool,
    /// Pause between closing a failed session and opening the next
    pub retry_cooldown: Duration,
    /// Longest wait for a session to close before giving up on it
    pub close_timeout: Duration,
    /// Where exhausted items are recorded; `None` keeps them in the report only
    pub failure_ledger: Option<PathBuf>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_items: None,
            retry_times: 3,
            delay_range: (Duration::from_secs(2), Duration::from_secs(4)),
            batch_size: None,
            headless: true,
            retry_cooldown: Duration::from_secs(2),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            failure_ledger: None,
        }
    }
}

impl ExecutorOptions {
    /// Options for a normal run as described by the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.scraper.max_workers,
            max_items: config.scraper.max_products,
            retry_times: config.scraper.retry_times,
            delay_range: config.scraper.delay_range(),
            batch_size: Some(config.scraper.batch_size),
            headless: config.browser.headless,
            retry_cooldown: Duration::from_secs(2),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            failure_ledger: Some(crate::config::output_path(
                config,
                crate::config::OutputKind::Failed,
            )),
        }
    }
}

/// What a run produced
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Processed items in completion order, enriched or not
    pub items: Vec<Item>,
    /// Items beyond `max_items`, untouched and in input order
    pub passthrough: Vec<Item>,
    pub succeeded: usize,
    pub failed: usize,
    /// Items that exhausted their retries during this run
    pub failures: Vec<FailureRecord>,
    pub batches: usize,
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Number of items that were scheduled
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn success_rate(&self) -> f64 {
        percent(self.succeeded, self.total())
    }

    /// Processed items followed by pass-through items
    pub fn into_items(self) -> Vec<Item> {
        let mut items = self.items;
        items.extend(self.passthrough);
        items
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// How one item's task ended
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    /// Detail fields were merged in
    Enriched(Item),
    /// The page loaded but carried no product data
    Empty(Item),
    /// Every attempt errored
    Failed(Item, FailureRecord),
}

/// Sole owner of a run's counters and sink
pub(crate) struct Aggregator<'s> {
    total: usize,
    started: Instant,
    completed: usize,
    flushed: usize,
    batch_size: Option<usize>,
    sink: Option<&'s mut dyn BatchSink>,
    report: ExecutionReport,
}

impl<'s> Aggregator<'s> {
    pub(crate) fn new(
        total: usize,
        batch_size: Option<usize>,
        sink: Option<&'s mut dyn BatchSink>,
    ) -> Self {
        Self {
            total,
            started: Instant::now(),
            completed: 0,
            flushed: 0,
            batch_size: batch_size.filter(|&n| n > 0),
            sink,
            report: ExecutionReport::default(),
        }
    }

    /// Records a finished task; `None` is a task that never returned its item
    pub(crate) fn record(&mut self, outcome: Option<TaskOutcome>) {
        self.completed += 1;

        match outcome {
            Some(TaskOutcome::Enriched(item)) => {
                self.report.succeeded += 1;
                self.report.items.push(item);
            }
            Some(TaskOutcome::Empty(item)) => {
                self.report.failed += 1;
                self.report.items.push(item);
            }
            Some(TaskOutcome::Failed(item, record)) => {
                self.report.failed += 1;
                self.report.failures.push(record);
                self.report.items.push(item);
            }
            None => self.report.failed += 1,
        }

        if let Some(size) = self.batch_size {
            if self.report.items.len() - self.flushed >= size {
                self.flush();
            }
        }

        if self.completed % PROGRESS_EVERY == 0 || self.completed == self.total {
            self.log_progress();
        }
    }

    fn log_progress(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let average = elapsed / self.completed.max(1) as f64;
        let remaining = self.total.saturating_sub(self.completed) as f64 * average;

        tracing::info!(
            "Progress: {}/{} ({:.1}%) - succeeded: {}, failed: {} - elapsed: {:.1}s - remaining: {:.1}s",
            self.completed,
            self.total,
            percent(self.completed, self.total),
            self.report.succeeded,
            self.report.failed,
            elapsed,
            remaining
        );
    }

    /// Hands everything completed since the last flush to the sink
    fn flush(&mut self) {
        let pending = &self.report.items[self.flushed..];
        if pending.is_empty() {
            return;
        }
        let Some(sink) = self.sink.as_deref_mut() else {
            return;
        };

        let number = self.report.batches + 1;
        tracing::info!("Batch {}: {} items completed, writing", number, pending.len());
        if let Err(e) = sink.write_batch(pending, number, number == 1) {
            tracing::error!("Failed to write batch {}: {}", number, e);
        }

        self.report.batches = number;
        self.flushed = self.report.items.len();
    }

    /// Flushes the final partial batch, updates the ledger and closes the run
    pub(crate) fn finish(
        mut self,
        passthrough: Vec<Item>,
        ledger: Option<&PathBuf>,
    ) -> ExecutionReport {
        if self.batch_size.is_some() {
            self.flush();
        }

        if let Some(path) = ledger {
            if !self.report.failures.is_empty() {
                if let Err(e) = FailureLedger::new(path).append(&self.report.failures) {
                    tracing::error!("Failed to update failure ledger {}: {}", path.display(), e);
                }
            }
        }

        let mut report = self.report;
        report.passthrough = passthrough;
        report.elapsed = self.started.elapsed();

        let total = report.total();
        tracing::info!(
            "Detail scraping finished in {:.1}s ({:.2}s/item): succeeded {}/{} ({:.1}%), failed {}/{} ({:.1}%)",
            report.elapsed.as_secs_f64(),
            report.elapsed.as_secs_f64() / total.max(1) as f64,
            report.succeeded,
            total,
            report.success_rate(),
            report.failed,
            total,
            percent(report.failed, total)
        );
        if !report.failures.is_empty() {
            tracing::info!(
                "{} items exhausted their retries; rerun them with --retry-failed",
                report.failures.len()
            );
        }

        report
    }
}

/// Splits off the items past `max_items`
pub(crate) fn split_items(mut items: Vec<Item>, max_items: Option<usize>) -> (Vec<Item>, Vec<Item>) {
    match max_items {
        Some(limit) if limit < items.len() => {
            let rest = items.split_off(limit);
            (items, rest)
        }
        _ => (items, Vec::new()),
    }
}

/// Uniform random duration within `range`
pub(crate) fn random_delay(range: (Duration, Duration)) -> Duration {
    let (low, high) = range;
    if high <= low {
        return low;
    }
    low + (high - low).mul_f64(fastrand::f64())
}

/// Closes a session, logging rather than propagating any error
///
/// A session still closing after `limit` is abandoned.
pub(crate) async fn close_quietly(mut session: Box<dyn BrowserSession>, limit: Duration) {
    match tokio::time::timeout(limit, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Error while closing session: {}", e),
        Err(_) => tracing::warn!("Session did not close within {:.1}s, abandoning it", limit.as_secs_f64()),
    }
}

/// Text of a caught panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Scrapes item details on a bounded pool of independent browser sessions
pub struct ParallelExecutor {
    factory: Arc<dyn SessionFactory>,
}

/// Per-run settings shared by every task
struct TaskContext {
    factory: Arc<dyn SessionFactory>,
    scraper: Arc<dyn DetailScraper>,
    semaphore: Arc<Semaphore>,
    retry_times: u32,
    delay_range: (Duration, Duration),
    retry_cooldown: Duration,
    close_timeout: Duration,
    headless: bool,
    total: usize,
}

impl ParallelExecutor {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Scrapes details for `items` and reports the outcome
    ///
    /// # Arguments
    ///
    /// * `items` - Stub items; only the first `max_items` are scraped
    /// * `scraper` - Extracts detail fields from a loaded session
    /// * `options` - Concurrency, retry, delay and batching settings
    /// * `sink` - Receives completed items in batches of `batch_size`
    ///
    /// Never fails as a whole: per-item errors end up in the report and the
    /// ledger. A panicking task is recorded as a failure of its item.
    pub async fn run(
        &self,
        items: Vec<Item>,
        scraper: Arc<dyn DetailScraper>,
        options: &ExecutorOptions,
        sink: Option<&mut dyn BatchSink>,
    ) -> ExecutionReport {
        let (to_scrape, passthrough) = split_items(items, options.max_items);
        let total = to_scrape.len();

        tracing::info!(
            "Starting parallel scrape of {} items (workers: {}, retries: {}, delay: {:.1}-{:.1}s)",
            total,
            options.max_workers,
            options.retry_times,
            options.delay_range.0.as_secs_f64(),
            options.delay_range.1.as_secs_f64()
        );

        let context = Arc::new(TaskContext {
            factory: Arc::clone(&self.factory),
            scraper,
            semaphore: Arc::new(Semaphore::new(options.max_workers.max(1))),
            retry_times: options.retry_times,
            delay_range: options.delay_range,
            retry_cooldown: options.retry_cooldown,
            close_timeout: options.close_timeout,
            headless: options.headless,
            total,
        });

        let mut tasks = JoinSet::new();
        for (index, item) in to_scrape.into_iter().enumerate() {
            let context = Arc::clone(&context);
            tasks.spawn(async move {
                let stub = item.clone();
                AssertUnwindSafe(scrape_item(context, item, index + 1))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        let error = format!("task panicked: {}", panic_message(payload.as_ref()));
                        tracing::error!("Detail task for {} {}", stub.url(), error);
                        let record = FailureRecord::new(stub.clone(), &error);
                        TaskOutcome::Failed(stub, record)
                    })
            });
        }

        let mut aggregator = Aggregator::new(total, options.batch_size, sink);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => aggregator.record(Some(outcome)),
                Err(e) => {
                    tracing::error!("Detail task aborted: {}", e);
                    aggregator.record(None);
                }
            }
        }

        aggregator.finish(passthrough, options.failure_ledger.as_ref())
    }
}

/// One item's task: wait for a permit, pause, then attempt up to `retry_times`
async fn scrape_item(context: Arc<TaskContext>, mut item: Item, index: usize) -> TaskOutcome {
    let total = context.total;
    let url = item.url().to_string();

    let _permit = match Arc::clone(&context.semaphore).acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            let record = FailureRecord::new(item.clone(), &e.to_string());
            return TaskOutcome::Failed(item, record);
        }
    };

    tokio::time::sleep(random_delay(context.delay_range)).await;

    let mut leftover: Option<Box<dyn BrowserSession>> = None;
    let mut last_error = String::from("no attempts were made");

    for attempt in 1..=context.retry_times {
        if attempt > 1 {
            if let Some(session) = leftover.take() {
                close_quietly(session, context.close_timeout).await;
            }
            tokio::time::sleep(context.retry_cooldown).await;
            tracing::warn!(
                "[{}/{}] Retry {}/{}: {}",
                index,
                total,
                attempt,
                context.retry_times,
                url
            );
        } else {
            tracing::info!("[{}/{}] Scraping {}", index, total, url);
        }

        let mut session = match context.factory.create_session(context.headless).await {
            Ok(session) => session,
            Err(e) => {
                last_error = e.to_string();
                log_attempt_failure(index, total, attempt, context.retry_times, &last_error);
                continue;
            }
        };

        match context.scraper.scrape(session.as_mut(), &url).await {
            Ok(details) => {
                close_quietly(session, context.close_timeout).await;
                return match details {
                    Some(details) => {
                        item.merge_details(details);
                        tracing::info!("[{}/{}] Done: {}", index, total, item.label());
                        TaskOutcome::Enriched(item)
                    }
                    None => {
                        tracing::warn!("[{}/{}] No product data: {}", index, total, url);
                        TaskOutcome::Empty(item)
                    }
                };
            }
            Err(e) => {
                last_error = e.to_string();
                log_attempt_failure(index, total, attempt, context.retry_times, &last_error);
                leftover = Some(session);
            }
        }
    }

    if let Some(session) = leftover.take() {
        close_quietly(session, context.close_timeout).await;
    }

    let record = FailureRecord::new(item.clone(), &last_error);
    TaskOutcome::Failed(item, record)
}

fn log_attempt_failure(index: usize, total: usize, attempt: u32, retry_times: u32, error: &str) {
    let short: String = error.chars().take(100).collect();
    if attempt < retry_times {
        tracing::warn!(
            "[{}/{}] Failed (attempt {}/{}): {}",
            index,
            total,
            attempt,
            retry_times,
            short
        );
    } else {
        tracing::error!("[{}/{}] Giving up: {}", index, total, short);
    }
}
