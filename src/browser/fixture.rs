//! Sessions backed by pre-rendered HTML
//!
//! A [`FixtureSession`] serves pages from memory instead of a live browser.
//! Clicking an element with an `href` follows the link the way a browser
//! would, so listing walks and detail extraction run unchanged against saved
//! pages. The factory tracks how many sessions are open at once.

use crate::browser::session::{BrowserSession, ElementSnapshot, Locator, SessionFactory};
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Default)]
struct SessionCounters {
    created: AtomicUsize,
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl SessionCounters {
    fn opened(&self) {
        self.created.fetch_add(1, Ordering::SeqCst);
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Creates [`FixtureSession`]s sharing one set of pages
#[derive(Debug, Clone, Default)]
pub struct FixtureSessionFactory {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<SessionCounters>,
    launch_delay: Duration,
    close: CloseBehavior,
}

/// How fixture sessions respond to `close`
#[derive(Debug, Clone, Copy, Default)]
struct CloseBehavior {
    delay: Duration,
    fails: bool,
}

impl FixtureSessionFactory {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Arc::new(pages),
            ..Self::default()
        }
    }

    /// Serves a single HTML file under its `file://` URL
    pub fn from_file(path: &Path) -> SessionResult<(Self, String)> {
        let html = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Launch(format!("{}: {}", path.display(), e)))?;
        let absolute = std::fs::canonicalize(path)
            .map_err(|e| SessionError::Launch(format!("{}: {}", path.display(), e)))?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| SessionError::Launch(format!("not a file path: {}", path.display())))?
            .to_string();

        let mut pages = HashMap::new();
        pages.insert(url.clone(), html);
        Ok((Self::new(pages), url))
    }

    /// Holds each launch for `delay`, imitating browser start-up time
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// Makes every session's `close` report an error after shutting down
    pub fn with_failing_close(mut self) -> Self {
        self.close.fails = true;
        self
    }

    /// Makes every session's `close` take `delay` to return
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close.delay = delay;
        self
    }

    /// Builds a session directly, without going through the async factory
    pub fn session(&self) -> FixtureSession {
        self.counters.opened();
        FixtureSession {
            pages: Arc::clone(&self.pages),
            counters: Arc::clone(&self.counters),
            current: None,
            closed: false,
            close: self.close,
        }
    }

    /// Total sessions ever created
    pub fn sessions_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Sessions currently open
    pub fn sessions_open(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Highest number of sessions open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FixtureSessionFactory {
    async fn create_session(&self, _headless: bool) -> SessionResult<Box<dyn BrowserSession>> {
        let session = self.session();
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        Ok(Box::new(session))
    }
}

/// A session navigating between in-memory pages
#[derive(Debug)]
pub struct FixtureSession {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<SessionCounters>,
    current: Option<String>,
    closed: bool,
    close: CloseBehavior,
}

impl FixtureSession {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn current_html(&self) -> SessionResult<&str> {
        self.ensure_open()?;
        let url = self
            .current
            .as_deref()
            .ok_or_else(|| SessionError::Script("no page loaded".to_string()))?;
        self.pages
            .get(url)
            .map(String::as_str)
            .ok_or_else(|| SessionError::Script(format!("no fixture for {}", url)))
    }

    fn snapshots(&self, locator: &Locator) -> SessionResult<Vec<ElementSnapshot>> {
        let html = self.current_html()?;
        let document = Html::parse_document(html);
        select(&document, locator)
    }

    /// Follows the first match's `href`, if it has one and is enabled
    fn follow(&mut self, locator: &Locator) -> SessionResult<()> {
        let target = {
            let found = self.snapshots(locator)?;
            let element = found
                .into_iter()
                .next()
                .ok_or_else(|| SessionError::ElementNotFound(locator.to_string()))?;
            if element.is_disabled() {
                return Ok(());
            }
            element.attr("href").map(str::to_string)
        };

        if let Some(href) = target {
            let base = self.current.clone().unwrap_or_default();
            let resolved = Url::parse(&base)
                .and_then(|b| b.join(&href))
                .map(|u| u.to_string())
                .unwrap_or(href);
            self.goto(&resolved)?;
        }
        Ok(())
    }

    fn goto(&mut self, url: &str) -> SessionResult<()> {
        self.ensure_open()?;
        if self.pages.contains_key(url) {
            self.current = Some(url.to_string());
            Ok(())
        } else {
            Err(SessionError::Navigation {
                url: url.to_string(),
                message: "no fixture page".to_string(),
            })
        }
    }
}

fn select(document: &Html, locator: &Locator) -> SessionResult<Vec<ElementSnapshot>> {
    let (css, text) = match locator {
        Locator::Css(selector) => (selector.as_str(), None),
        Locator::ButtonText(text) => ("button", Some(text.as_str())),
    };
    let selector =
        Selector::parse(css).map_err(|e| SessionError::Script(format!("{}: {:?}", css, e)))?;

    Ok(document
        .select(&selector)
        .map(snapshot)
        .filter(|s| text.map(|t| s.text.contains(t)).unwrap_or(true))
        .collect())
}

fn snapshot(element: ElementRef<'_>) -> ElementSnapshot {
    ElementSnapshot {
        text: element.text().collect::<String>().trim().to_string(),
        attributes: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl Drop for FixtureSession {
    fn drop(&mut self) {
        if !self.closed {
            self.counters.closed();
        }
    }
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        self.goto(url)
    }

    async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> SessionResult<bool> {
        Ok(!self.snapshots(locator)?.is_empty())
    }

    async fn wait_until_ready(&mut self, _timeout: Duration) -> SessionResult<bool> {
        self.ensure_open()?;
        Ok(self.current.is_some())
    }

    async fn find(&mut self, locator: &Locator) -> SessionResult<Vec<ElementSnapshot>> {
        self.snapshots(locator)
    }

    async fn scroll_into_view(&mut self, locator: &Locator) -> SessionResult<()> {
        if self.snapshots(locator)?.is_empty() {
            Err(SessionError::ElementNotFound(locator.to_string()))
        } else {
            Ok(())
        }
    }

    async fn click(&mut self, locator: &Locator) -> SessionResult<()> {
        self.follow(locator)
    }

    async fn script_click(&mut self, locator: &Locator) -> SessionResult<()> {
        self.follow(locator)
    }

    async fn current_url(&mut self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn page_source(&mut self) -> SessionResult<String> {
        self.current_html().map(str::to_string)
    }

    async fn close(&mut self) -> SessionResult<()> {
        if !self.closed {
            self.closed = true;
            self.counters.closed();
        }
        if !self.close.delay.is_zero() {
            tokio::time::sleep(self.close.delay).await;
        }
        if self.close.fails {
            return Err(SessionError::Script("browser did not exit cleanly".to_string()));
        }
        Ok(())
    }
}
