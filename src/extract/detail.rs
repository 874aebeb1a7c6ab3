//! Product detail page extraction

use crate::browser::{default_popup_strategies, dismiss_popups, BrowserSession, Locator};
use crate::extract::payload::{extract_fields, find_embedded_payload};
use crate::item::DetailFields;
use crate::SessionResult;
use async_trait::async_trait;
use std::time::Duration;

/// Scrapes the detail fields for one product URL on a given session
///
/// `Ok(None)` is an empty record: the page loaded but carried no usable
/// product data. `Err` marks a failure worth retrying on a fresh session.
#[async_trait]
pub trait DetailScraper: Send + Sync {
    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> SessionResult<Option<DetailFields>>;
}

/// Reads detail fields from the page's embedded layout payload
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    ready_wait: Duration,
    popup_strategies: Vec<Locator>,
    popup_settle: Duration,
    product_type: String,
}

impl Default for DetailExtractor {
    fn default() -> Self {
        Self {
            ready_wait: Duration::from_secs(10),
            popup_strategies: default_popup_strategies(),
            popup_settle: Duration::from_secs(1),
            product_type: String::new(),
        }
    }
}

impl DetailExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Category label written into every extracted record
    pub fn with_product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }

    pub fn with_ready_wait(mut self, wait: Duration) -> Self {
        self.ready_wait = wait;
        self
    }

    pub fn with_popup_settle(mut self, settle: Duration) -> Self {
        self.popup_settle = settle;
        self
    }

    pub async fn extract(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> SessionResult<Option<DetailFields>> {
        session.navigate(url).await?;
        dismiss_popups(session, &self.popup_strategies, self.popup_settle).await;

        if !session.wait_until_ready(self.ready_wait).await? {
            tracing::debug!("{} still loading after {:?}, reading anyway", url, self.ready_wait);
        }

        let html = session.page_source().await?;
        Ok(self.extract_html(&html, url))
    }

    /// Extracts detail fields from an already-rendered page
    pub fn extract_html(&self, html: &str, url: &str) -> Option<DetailFields> {
        let Some(payload) = find_embedded_payload(html) else {
            tracing::warn!("No __LAYOUT__ payload on {}", url);
            return None;
        };

        match extract_fields(&payload) {
            Some(mut fields) => {
                fields.product_type = self.product_type.clone();
                Some(fields)
            }
            None => {
                tracing::warn!("Layout payload on {} has no product record", url);
                None
            }
        }
    }
}

#[async_trait]
impl DetailScraper for DetailExtractor {
    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> SessionResult<Option<DetailFields>> {
        self.extract(session, url).await
    }
}
