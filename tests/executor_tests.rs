//! Integration tests for the parallel and sequential detail executors
//!
//! These tests drive the executors with in-memory fixture sessions and a
//! scripted detail scraper, so no browser is launched.

use async_trait::async_trait;
use hb_scraper::browser::{BrowserSession, FixtureSessionFactory, SessionFactory};
use hb_scraper::crawler::{ExecutorOptions, ParallelExecutor, SequentialExecutor};
use hb_scraper::extract::DetailScraper;
use hb_scraper::storage::{BatchSink, ColumnSchema, CsvBatchSink, FailureLedger, StorageResult};
use hb_scraper::{DetailFields, Item, ProductFields, SessionError, SessionResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fails a URL on its first `n` attempts, then succeeds
struct ScriptedScraper {
    failing: HashMap<String, u32>,
    panicking: HashSet<String>,
    attempts: Mutex<HashMap<String, u32>>,
    work: Duration,
}

impl ScriptedScraper {
    fn new() -> Self {
        Self {
            failing: HashMap::new(),
            panicking: HashSet::new(),
            attempts: Mutex::new(HashMap::new()),
            work: Duration::from_millis(5),
        }
    }

    fn fail_first(mut self, url: &str, attempts: u32) -> Self {
        self.failing.insert(url.to_string(), attempts);
        self
    }

    fn always_fail(self, url: &str) -> Self {
        self.fail_first(url, u32::MAX)
    }

    fn panic_on(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    fn attempts(&self, url: &str) -> u32 {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DetailScraper for ScriptedScraper {
    async fn scrape(
        &self,
        _session: &mut dyn BrowserSession,
        url: &str,
    ) -> SessionResult<Option<DetailFields>> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        tokio::time::sleep(self.work).await;

        if self.panicking.contains(url) {
            panic!("scraper bug on {}", url);
        }
        if attempt <= self.failing.get(url).copied().unwrap_or(0) {
            return Err(SessionError::Timeout {
                what: format!("{} (attempt {})", url, attempt),
                seconds: 60,
            });
        }
        Ok(Some(DetailFields {
            highlights: format!("details of {}", url),
            ..Default::default()
        }))
    }
}

/// Records every batch it is handed
#[derive(Default)]
struct RecordingSink {
    batches: Vec<(usize, bool, Vec<String>)>,
}

impl BatchSink for RecordingSink {
    fn write_batch(&mut self, items: &[Item], batch_number: usize, is_first: bool) -> StorageResult<()> {
        let urls = items.iter().map(|i| i.url().to_string()).collect();
        self.batches.push((batch_number, is_first, urls));
        Ok(())
    }
}

/// A factory whose browser never starts
struct BrokenFactory;

#[async_trait]
impl SessionFactory for BrokenFactory {
    async fn create_session(&self, _headless: bool) -> SessionResult<Box<dyn BrowserSession>> {
        Err(SessionError::Launch("chrome not found".to_string()))
    }
}

fn url(n: usize) -> String {
    format!("https://shop.test/p/{}", n)
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            Item::stub(ProductFields {
                name: format!("Product {}", i),
                url: url(i),
                ..Default::default()
            })
        })
        .collect()
}

fn options(max_workers: usize, retry_times: u32) -> ExecutorOptions {
    ExecutorOptions {
        max_workers,
        retry_times,
        delay_range: (Duration::ZERO, Duration::ZERO),
        retry_cooldown: Duration::ZERO,
        ..Default::default()
    }
}

fn factory() -> Arc<FixtureSessionFactory> {
    Arc::new(FixtureSessionFactory::new(HashMap::new()).with_launch_delay(Duration::from_millis(2)))
}

#[tokio::test]
async fn test_ten_items_two_always_failing() {
    let factory = factory();
    let scraper = Arc::new(ScriptedScraper::new().always_fail(&url(2)).always_fail(&url(5)));

    let report = ParallelExecutor::new(factory.clone())
        .run(items(10), scraper.clone(), &options(3, 2), None)
        .await;

    assert_eq!(report.total(), 10);
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.failed, 2);
    assert_eq!(report.items.iter().filter(|i| i.is_enriched()).count(), 8);

    let failed: HashSet<_> = report.failures.iter().map(|f| f.url.clone()).collect();
    assert_eq!(failed, HashSet::from([url(2), url(5)]));

    assert!(factory.peak_sessions() <= 3);
    assert_eq!(factory.sessions_open(), 0);
}

#[tokio::test]
async fn test_retry_bound_leaves_item_untouched() {
    let scraper = Arc::new(ScriptedScraper::new().always_fail(&url(0)));
    let input = items(1);

    let report = ParallelExecutor::new(factory())
        .run(input.clone(), scraper.clone(), &options(1, 4), None)
        .await;

    assert_eq!(scraper.attempts(&url(0)), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item_data, input[0]);
    assert_eq!(report.items, input);
    assert!(report.failures[0].error.contains("attempt 4"));
}

#[tokio::test]
async fn test_success_stops_retrying() {
    let scraper = Arc::new(ScriptedScraper::new().fail_first(&url(0), 2));

    let report = ParallelExecutor::new(factory())
        .run(items(1), scraper.clone(), &options(1, 5), None)
        .await;

    assert_eq!(scraper.attempts(&url(0)), 3);
    assert_eq!(report.succeeded, 1);
    assert!(report.failures.is_empty());
    assert!(report.items[0].is_enriched());
}

#[tokio::test]
async fn test_concurrency_never_exceeds_worker_count() {
    for workers in [1, 2, 4, 8] {
        let factory = factory();
        let scraper = Arc::new(ScriptedScraper::new().fail_first(&url(3), 1));

        let report = ParallelExecutor::new(factory.clone())
            .run(items(20), scraper, &options(workers, 2), None)
            .await;

        assert_eq!(report.succeeded, 20);
        assert!(
            factory.peak_sessions() <= workers,
            "peak {} exceeds {} workers",
            factory.peak_sessions(),
            workers
        );
        assert_eq!(factory.sessions_open(), 0);
    }
}

#[tokio::test]
async fn test_batches_cover_every_item_once() {
    let mut sink = RecordingSink::default();
    let mut opts = options(3, 1);
    opts.batch_size = Some(3);

    let report = ParallelExecutor::new(factory())
        .run(
            items(7),
            Arc::new(ScriptedScraper::new()),
            &opts,
            Some(&mut sink),
        )
        .await;

    assert_eq!(report.batches, 3);
    let numbers: Vec<_> = sink.batches.iter().map(|b| b.0).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let firsts: Vec<_> = sink.batches.iter().map(|b| b.1).collect();
    assert_eq!(firsts, vec![true, false, false]);

    let sizes: Vec<_> = sink.batches.iter().map(|b| b.2.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);

    let seen: Vec<String> = sink.batches.iter().flat_map(|b| b.2.clone()).collect();
    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), 7);
    assert_eq!(unique, (0..7).map(url).collect::<HashSet<_>>());
}

#[tokio::test]
async fn test_batches_stream_into_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("complete.csv");
    let mut sink = CsvBatchSink::new(&path, ColumnSchema::Complete);
    let mut opts = options(2, 1);
    opts.batch_size = Some(4);

    ParallelExecutor::new(factory())
        .run(items(10), Arc::new(ScriptedScraper::new()), &opts, Some(&mut sink))
        .await;

    assert_eq!(sink.rows_written(), 10);
    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(reader.records().count(), 10);
}

#[tokio::test]
async fn test_ledger_keeps_failures_from_every_run() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("failed_products.json");
    let mut opts = options(2, 1);
    opts.failure_ledger = Some(ledger_path.clone());

    let first = Arc::new(ScriptedScraper::new().always_fail(&url(0)).always_fail(&url(1)));
    ParallelExecutor::new(factory())
        .run(items(4), first, &opts, None)
        .await;

    let second = Arc::new(ScriptedScraper::new().always_fail(&url(3)));
    ParallelExecutor::new(factory())
        .run(items(4), second, &opts, None)
        .await;

    let urls: HashSet<_> = FailureLedger::new(&ledger_path)
        .load()
        .unwrap()
        .into_iter()
        .map(|r| r.url)
        .collect();
    assert_eq!(urls, HashSet::from([url(0), url(1), url(3)]));
}

#[tokio::test]
async fn test_max_items_passes_the_rest_through() {
    let scraper = Arc::new(ScriptedScraper::new());
    let mut opts = options(2, 1);
    opts.max_items = Some(3);

    let report = ParallelExecutor::new(factory())
        .run(items(5), scraper.clone(), &opts, None)
        .await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.passthrough.len(), 2);
    assert_eq!(scraper.attempts(&url(4)), 0);
    assert!(!report.passthrough[0].is_enriched());
    assert_eq!(report.into_items().len(), 5);
}

#[tokio::test]
async fn test_launch_failures_are_recorded_per_item() {
    let report = ParallelExecutor::new(Arc::new(BrokenFactory))
        .run(items(3), Arc::new(ScriptedScraper::new()), &options(2, 2), None)
        .await;

    assert_eq!(report.failed, 3);
    assert_eq!(report.failures.len(), 3);
    assert!(report
        .failures
        .iter()
        .all(|f| f.error.contains("chrome not found")));
}

#[tokio::test]
async fn test_sequential_runs_in_order_on_one_session() {
    let factory = factory();
    let scraper = ScriptedScraper::new().always_fail(&url(1));
    let mut sink = RecordingSink::default();
    let mut opts = options(3, 3);
    opts.batch_size = Some(2);

    let report = SequentialExecutor::new(factory.clone())
        .run(items(4), &scraper, &opts, Some(&mut sink))
        .await
        .unwrap();

    assert_eq!(factory.sessions_created(), 1);
    assert_eq!(factory.sessions_open(), 0);
    assert_eq!(scraper.attempts(&url(1)), 1);
    assert_eq!((report.succeeded, report.failed), (3, 1));
    let order: Vec<_> = report.items.iter().map(|i| i.url().to_string()).collect();
    assert_eq!(order, (0..4).map(url).collect::<Vec<_>>());
    assert_eq!(sink.batches.len(), 2);
}

#[tokio::test]
async fn test_sequential_launch_failure_is_an_error() {
    let result = SequentialExecutor::new(Arc::new(BrokenFactory))
        .run(items(2), &ScriptedScraper::new(), &options(1, 1), None)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_failing_close_does_not_stop_retries() {
    let factory = Arc::new(FixtureSessionFactory::new(HashMap::new()).with_failing_close());
    let scraper = Arc::new(ScriptedScraper::new().fail_first(&url(0), 2).always_fail(&url(1)));

    let report = ParallelExecutor::new(factory.clone())
        .run(items(3), scraper.clone(), &options(2, 3), None)
        .await;

    assert_eq!(scraper.attempts(&url(0)), 3);
    assert_eq!(scraper.attempts(&url(1)), 3);
    assert_eq!((report.succeeded, report.failed), (2, 1));
    assert!(report.items.iter().find(|i| i.url() == url(0)).unwrap().is_enriched());
    assert_eq!(report.failures[0].url, url(1));
    assert_eq!(factory.sessions_open(), 0);
}

#[tokio::test]
async fn test_hung_close_is_abandoned() {
    let factory = Arc::new(
        FixtureSessionFactory::new(HashMap::new()).with_close_delay(Duration::from_secs(3600)),
    );
    let scraper = Arc::new(ScriptedScraper::new().fail_first(&url(0), 1));
    let mut opts = options(1, 2);
    opts.close_timeout = Duration::from_millis(20);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        ParallelExecutor::new(factory).run(items(2), scraper.clone(), &opts, None),
    )
    .await
    .expect("executor blocked on a hung session");

    assert_eq!(scraper.attempts(&url(0)), 2);
    assert_eq!(report.succeeded, 2);
}

#[tokio::test]
async fn test_sequential_survives_failing_close() {
    let factory = Arc::new(FixtureSessionFactory::new(HashMap::new()).with_failing_close());

    let report = SequentialExecutor::new(factory)
        .run(items(2), &ScriptedScraper::new(), &options(1, 1), None)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
}

#[tokio::test]
async fn test_panicking_task_keeps_its_item() {
    let scraper = Arc::new(ScriptedScraper::new().panic_on(&url(2)));
    let mut sink = RecordingSink::default();
    let mut opts = options(2, 2);
    opts.batch_size = Some(2);

    let report = ParallelExecutor::new(factory())
        .run(items(5), scraper, &opts, Some(&mut sink))
        .await;

    assert_eq!((report.succeeded, report.failed), (4, 1));
    assert_eq!(report.items.len(), 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, url(2));
    assert!(report.failures[0].error.contains("scraper bug"));

    let written: usize = sink.batches.iter().map(|b| b.2.len()).sum();
    assert_eq!(written, 5);
}
