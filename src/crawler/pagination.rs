//! Pagination walker
//!
//! Walks a category listing page by page in one browser session, including:
//! - Resuming from saved progress when the caller agrees
//! - Detecting and clicking the next-page control
//! - Persisting progress after every scraped page
//! - Stopping cleanly on cancellation with progress kept for a later run

use crate::browser::{default_popup_strategies, dismiss_popups, BrowserSession, Locator};
use crate::config::Config;
use crate::extract::ListingExtractor;
use crate::item::Item;
use crate::state::{CrawlProgress, ProgressStore, WalkState};
use crate::{Result, ScraperError};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// The listing's next-page control
pub const NEXT_SELECTOR: &str = r#"[data-test="button-next"]"#;

/// The pagination entry for the page being shown
const CURRENT_PAGE_SELECTOR: &str = r#"[aria-current="page"]"#;

/// Decides whether saved progress should be picked up
#[async_trait]
pub trait ResumeDecider: Send + Sync {
    async fn should_resume(&self, progress: &CrawlProgress) -> bool;
}

/// Answers every resume question the same way
#[derive(Debug, Clone, Copy)]
pub struct AutoResume(pub bool);

#[async_trait]
impl ResumeDecider for AutoResume {
    async fn should_resume(&self, _progress: &CrawlProgress) -> bool {
        self.0
    }
}

/// Pacing and limits for a walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Pages to scrape in this run; `None` walks until the listing ends
    pub max_pages: Option<u32>,
    /// Pause between pages
    pub page_delay: Duration,
    /// Pause after scrolling the next control into view
    pub scroll_settle: Duration,
    /// Pause after clicking the next control
    pub click_settle: Duration,
    /// How long the next page's cards may take to appear
    pub advance_wait: Duration,
    /// Pause after dismissing a pop-up
    pub popup_settle: Duration,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            page_delay: Duration::from_secs(2),
            scroll_settle: Duration::from_secs(1),
            click_settle: Duration::from_secs(3),
            advance_wait: Duration::from_secs(10),
            popup_settle: Duration::from_secs(1),
        }
    }
}

impl WalkOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: config.scraper.max_pages,
            page_delay: config.scraper.page_delay(),
            ..Self::default()
        }
    }
}

/// Result of a walk
#[derive(Debug)]
pub struct WalkOutcome {
    /// `Done` or `Interrupted`
    pub state: WalkState,
    /// Every item collected, including any carried over from saved progress
    pub items: Vec<Item>,
    /// Pages scraped by this run
    pub pages_scraped: u32,
    /// Number of the last page scraped, 0 when none was
    pub last_page: u32,
    /// The page this run started from when it resumed saved progress
    pub resumed_from: Option<u32>,
}

impl WalkOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == WalkState::Done
    }
}

/// Where a walk begins
struct Entry {
    items: Vec<Item>,
    page: u32,
    prior_pages: u32,
    resumed_from: Option<u32>,
}

/// Sequential listing walker driven by the next-page control
pub struct PaginationWalker {
    listing: ListingExtractor,
    options: WalkOptions,
    store: Option<ProgressStore>,
    decider: Box<dyn ResumeDecider>,
    cancel: CancellationToken,
    popup_strategies: Vec<Locator>,
    state: WalkState,
}

impl PaginationWalker {
    pub fn new(listing: ListingExtractor, options: WalkOptions) -> Self {
        Self {
            listing,
            options,
            store: None,
            decider: Box::new(AutoResume(true)),
            cancel: CancellationToken::new(),
            popup_strategies: default_popup_strategies(),
            state: WalkState::Start,
        }
    }

    /// Enables resume: progress is loaded from and saved to `store`
    pub fn with_progress_store(mut self, store: ProgressStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_resume_decider(mut self, decider: Box<dyn ResumeDecider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    fn transition(&mut self, next: WalkState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ScraperError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Walk state {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    async fn entry(&self, base_url: &str) -> Entry {
        let fresh = Entry {
            items: Vec::new(),
            page: 1,
            prior_pages: 0,
            resumed_from: None,
        };
        let Some(store) = &self.store else {
            return fresh;
        };

        let progress = match store.load() {
            Ok(Some(progress)) => progress,
            Ok(None) => return fresh,
            Err(e) => {
                tracing::warn!("Could not read saved progress: {}", e);
                return fresh;
            }
        };

        if !progress.matches(base_url) {
            tracing::debug!("Saved progress is for {}, ignoring", progress.base_url);
            return fresh;
        }

        tracing::info!(
            "Found saved progress: {} pages, {} products (saved {})",
            progress.pages_scraped,
            progress.total_products,
            progress.timestamp
        );
        if !self.decider.should_resume(&progress).await {
            tracing::info!("Starting over from page 1");
            return fresh;
        }

        let page = progress.last_page + 1;
        tracing::info!("Resuming from page {}", page);
        Entry {
            items: progress.products,
            page,
            prior_pages: progress.pages_scraped,
            resumed_from: Some(page),
        }
    }

    /// Walks the listing at `base_url` until it ends, a limit is hit, or the
    /// walk is cancelled
    ///
    /// Cancellation is not an error: the outcome carries the items gathered
    /// so far with state `Interrupted`, and saved progress is left in place.
    /// A page that fails to load ends the walk as `Done` with the items
    /// gathered so far; saved progress is kept so the page can be retried.
    /// Otherwise saved progress is removed when the walk reaches `Done`.
    pub async fn walk(
        &mut self,
        session: &mut dyn BrowserSession,
        base_url: &str,
    ) -> Result<WalkOutcome> {
        self.state = WalkState::Start;
        let Entry {
            mut items,
            mut page,
            prior_pages,
            resumed_from,
        } = self.entry(base_url).await;

        let mut url = if page > 1 {
            with_page_param(base_url, page)
        } else {
            base_url.to_string()
        };
        let mut pages_scraped = 0u32;
        let mut last_page = 0u32;
        let mut page_failed = false;

        tracing::info!(
            "Starting listing walk at page {} (max pages: {})",
            page,
            self.options
                .max_pages
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        );

        loop {
            tracing::info!("Scraping page {}", page);
            let scraped = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.listing.extract(session, &url) => Some(result),
            };
            let Some(result) = scraped else {
                self.transition(WalkState::Interrupted)?;
                break;
            };

            let page_items = match result {
                Ok(page_items) => page_items,
                Err(e) => {
                    tracing::error!("Page {} failed to load, ending the walk: {}", page, e);
                    page_failed = true;
                    self.transition(WalkState::Done)?;
                    break;
                }
            };
            if page_items.is_empty() {
                tracing::info!("Page {} has no products, stopping", page);
                self.transition(WalkState::Done)?;
                break;
            }

            let count = page_items.len();
            items.extend(page_items);
            pages_scraped += 1;
            last_page = page;
            self.transition(WalkState::PageLoaded)?;
            tracing::info!("Page {} done: {} products, {} total", page, count, items.len());

            if let Some(store) = &self.store {
                let progress =
                    CrawlProgress::new(base_url, page, prior_pages + pages_scraped, items.clone());
                if let Err(e) = store.save(&progress) {
                    tracing::warn!("Failed to save progress: {}", e);
                }
            }

            if self.options.max_pages.is_some_and(|max| pages_scraped >= max) {
                tracing::info!("Reached page limit ({} pages)", pages_scraped);
                self.transition(WalkState::Done)?;
                break;
            }

            if self.cancel.is_cancelled() {
                self.transition(WalkState::Interrupted)?;
                break;
            }

            if !has_next_page(session).await {
                tracing::info!("No more pages");
                self.transition(WalkState::NoNext)?;
                self.transition(WalkState::Done)?;
                break;
            }

            self.transition(WalkState::Advancing)?;
            if !self.advance(session).await {
                tracing::info!("Could not move past page {}, stopping", page);
                self.transition(WalkState::Done)?;
                break;
            }

            page += 1;
            url = match session.current_url().await {
                Ok(current) if !current.is_empty() => current,
                _ => with_page_param(base_url, page),
            };

            let interrupted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => true,
                _ = tokio::time::sleep(self.options.page_delay) => false,
            };
            if interrupted {
                self.transition(WalkState::Interrupted)?;
                break;
            }
        }

        match self.state {
            WalkState::Done if page_failed => {
                if self.store.is_some() {
                    tracing::warn!("Keeping saved progress so the failed page can be retried");
                }
            }
            WalkState::Done => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.clear() {
                        tracing::warn!("Failed to clear saved progress: {}", e);
                    }
                }
            }
            WalkState::Interrupted => tracing::warn!(
                "Walk interrupted after {} pages; progress saved for next time",
                pages_scraped
            ),
            _ => {}
        }

        tracing::info!(
            "Listing walk finished: {} pages this run, {} products",
            pages_scraped,
            items.len()
        );

        Ok(WalkOutcome {
            state: self.state,
            items,
            pages_scraped,
            last_page,
            resumed_from,
        })
    }

    /// Clicks through to the next page and checks the page number moved on
    async fn advance(&self, session: &mut dyn BrowserSession) -> bool {
        let next = Locator::css(NEXT_SELECTOR);
        let before = current_page_number(session).await;

        dismiss_popups(session, &self.popup_strategies, self.options.popup_settle).await;

        if let Err(e) = session.scroll_into_view(&next).await {
            tracing::warn!("Next-page control unavailable: {}", e);
            return false;
        }
        tokio::time::sleep(self.options.scroll_settle).await;

        if let Err(e) = session.click(&next).await {
            tracing::debug!("Click on next-page control failed ({}), using script click", e);
            if let Err(e) = session.script_click(&next).await {
                tracing::warn!("Script click on next-page control failed: {}", e);
                return false;
            }
        }
        tokio::time::sleep(self.options.click_settle).await;

        match session
            .wait_for(&ListingExtractor::card_locator(), self.options.advance_wait)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Products did not reappear after clicking next");
                return false;
            }
            Err(e) => {
                tracing::warn!("Waiting for the next page failed: {}", e);
                return false;
            }
        }

        let after = current_page_number(session).await;
        if after > before || after == 1 {
            tracing::info!("Moved to page {}", after);
            true
        } else {
            tracing::info!("Page number stayed at {}", after);
            false
        }
    }
}

/// True when a next-page control exists and is not disabled
pub async fn has_next_page(session: &mut dyn BrowserSession) -> bool {
    match session.find(&Locator::css(NEXT_SELECTOR)).await {
        Ok(found) => found.first().map(|el| !el.is_disabled()).unwrap_or(false),
        Err(e) => {
            tracing::debug!("Next-page lookup failed: {}", e);
            false
        }
    }
}

/// Page number from the URL, then the pagination markup, defaulting to 1
pub async fn current_page_number(session: &mut dyn BrowserSession) -> u32 {
    if let Ok(url) = session.current_url().await {
        if let Some(page) = page_number_from_url(&url) {
            return page;
        }
    }

    match session.find(&Locator::css(CURRENT_PAGE_SELECTOR)).await {
        Ok(found) => found
            .first()
            .and_then(|el| el.text.trim().parse().ok())
            .unwrap_or(1),
        Err(_) => 1,
    }
}

/// The `page` query parameter, if present and numeric
pub fn page_number_from_url(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    let page = parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok());
    page
}

/// `base_url` with `page=n` appended to its query
pub fn with_page_param(base_url: &str, page: u32) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base_url, separator, page)
}
