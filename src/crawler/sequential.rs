//! Sequential detail scraping on a single reused session

use crate::browser::SessionFactory;
use crate::crawler::executor::{
    close_quietly, random_delay, split_items, Aggregator, ExecutionReport, ExecutorOptions,
    TaskOutcome,
};
use crate::extract::DetailScraper;
use crate::item::Item;
use crate::storage::{BatchSink, FailureRecord};
use crate::Result;
use std::sync::Arc;

/// Scrapes items one after another in a single browser session
///
/// Slower than [`crate::crawler::ParallelExecutor`] but far lighter on memory.
/// Items are not retried; an error marks the item failed and moves on.
pub struct SequentialExecutor {
    factory: Arc<dyn SessionFactory>,
}

impl SequentialExecutor {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Scrapes details for `items` in input order
    ///
    /// Fails only when the session cannot be launched.
    pub async fn run(
        &self,
        items: Vec<Item>,
        scraper: &dyn DetailScraper,
        options: &ExecutorOptions,
        sink: Option<&mut dyn BatchSink>,
    ) -> Result<ExecutionReport> {
        let (to_scrape, passthrough) = split_items(items, options.max_items);
        let total = to_scrape.len();
        tracing::info!("Starting sequential scrape of {} items", total);

        let mut session = self.factory.create_session(options.headless).await?;
        let mut aggregator = Aggregator::new(total, options.batch_size, sink);

        for (index, mut item) in to_scrape.into_iter().enumerate() {
            tokio::time::sleep(random_delay(options.delay_range)).await;
            tracing::info!("[{}/{}] {}", index + 1, total, item.label());

            let url = item.url().to_string();
            let outcome = match scraper.scrape(session.as_mut(), &url).await {
                Ok(Some(details)) => {
                    item.merge_details(details);
                    TaskOutcome::Enriched(item)
                }
                Ok(None) => TaskOutcome::Empty(item),
                Err(e) => {
                    tracing::error!("[{}/{}] Failed: {}", index + 1, total, e);
                    let record = FailureRecord::new(item.clone(), &e.to_string());
                    TaskOutcome::Failed(item, record)
                }
            };
            aggregator.record(Some(outcome));
        }

        close_quietly(session, options.close_timeout).await;
        Ok(aggregator.finish(passthrough, options.failure_ledger.as_ref()))
    }
}
