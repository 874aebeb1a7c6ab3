//! Chrome sessions driven over the DevTools protocol
//!
//! Each [`ChromeSession`] launches its own Chrome process with a private
//! profile directory, so workers never share cookies, caches or tabs.

use crate::browser::session::{BrowserSession, ElementSnapshot, Locator, SessionFactory};
use crate::config::{BrowserConfig, PageLoadStrategy};
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

/// Interval between polls while waiting on page state
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Switches that hide the most common automation fingerprints
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-software-rasterizer",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Launches Chrome sessions configured from [`BrowserConfig`]
pub struct ChromeSessionFactory {
    config: BrowserConfig,
    launched: AtomicUsize,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            launched: AtomicUsize::new(0),
        }
    }

    fn profile_dir(&self) -> PathBuf {
        let n = self.launched.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("hb-scraper-{}-{}", std::process::id(), n))
    }

    fn launch_config(&self, headless: bool, profile_dir: &PathBuf) -> SessionResult<CdpConfig> {
        let mut builder = CdpConfig::builder()
            .no_sandbox()
            .user_data_dir(profile_dir)
            .request_timeout(self.config.page_load_timeout())
            .args(STEALTH_ARGS.iter().copied())
            .arg(format!("--user-agent={}", self.config.user_agent))
            .args(self.config.extra_args.iter().map(String::as_str));

        if !headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(SessionError::Launch)
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create_session(&self, headless: bool) -> SessionResult<Box<dyn BrowserSession>> {
        let profile_dir = self.profile_dir();
        let launch_config = self.launch_config(headless, &profile_dir)?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(SessionError::Launch(format!("failed to open tab: {}", e)));
            }
        };

        tracing::debug!("Launched browser session ({})", profile_dir.display());

        Ok(Box::new(ChromeSession {
            browser,
            page,
            handler_task,
            profile_dir,
            strategy: self.config.page_load_strategy,
            page_load_timeout: self.config.page_load_timeout(),
            script_timeout: self.config.script_timeout(),
            closed: false,
        }))
    }
}

/// A single Chrome process with one tab
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    strategy: PageLoadStrategy,
    page_load_timeout: Duration,
    script_timeout: Duration,
    closed: bool,
}

impl ChromeSession {
    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    /// Evaluates `script` and deserializes its JSON result
    async fn evaluate<T: DeserializeOwned>(&self, script: String) -> SessionResult<T> {
        self.ensure_open()?;
        let result = timeout(self.script_timeout, self.page.evaluate(script))
            .await
            .map_err(|_| SessionError::Timeout {
                what: "script evaluation".to_string(),
                seconds: self.script_timeout.as_secs(),
            })?
            .map_err(|e| SessionError::Script(e.to_string()))?;

        result
            .into_value::<T>()
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn ready_state(&self) -> SessionResult<String> {
        self.evaluate("document.readyState".to_string()).await
    }

    /// Polls `document.readyState` until it is one of `accepted`
    async fn poll_ready_state(&self, accepted: &[&str], limit: Duration) -> SessionResult<bool> {
        let deadline = Instant::now() + limit;
        loop {
            let state = self.ready_state().await?;
            if accepted.contains(&state.as_str()) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn start_navigation(&self, url: &str) -> SessionResult<()> {
        let response = timeout(
            self.page_load_timeout,
            self.page.execute(NavigateParams::new(url)),
        )
        .await
        .map_err(|_| SessionError::Timeout {
            what: format!("navigation to {}", url),
            seconds: self.page_load_timeout.as_secs(),
        })?
        .map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        match &response.result.error_text {
            Some(error) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: error.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Builds a script expression evaluating to an array of elements matching `locator`
fn locate_all_js(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(selector)
        ),
        Locator::ButtonText(text) => format!(
            "Array.from(document.querySelectorAll('button')).filter(b => (b.textContent || '').includes({}))",
            js_string(text)
        ),
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> SessionResult<()> {
        self.ensure_open()?;
        match self.strategy {
            PageLoadStrategy::Normal => {
                timeout(self.page_load_timeout, self.page.goto(url))
                    .await
                    .map_err(|_| SessionError::Timeout {
                        what: format!("navigation to {}", url),
                        seconds: self.page_load_timeout.as_secs(),
                    })?
                    .map_err(|e| SessionError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(())
            }
            PageLoadStrategy::Eager => {
                self.start_navigation(url).await?;
                let ready = self
                    .poll_ready_state(&["interactive", "complete"], self.page_load_timeout)
                    .await?;
                if ready {
                    Ok(())
                } else {
                    Err(SessionError::Timeout {
                        what: format!("DOM of {}", url),
                        seconds: self.page_load_timeout.as_secs(),
                    })
                }
            }
            PageLoadStrategy::None => self.start_navigation(url).await,
        }
    }

    async fn wait_for(&mut self, locator: &Locator, limit: Duration) -> SessionResult<bool> {
        let script = format!("{}.length", locate_all_js(locator));
        let deadline = Instant::now() + limit;
        loop {
            let count: u64 = self.evaluate(script.clone()).await?;
            if count > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until_ready(&mut self, limit: Duration) -> SessionResult<bool> {
        self.poll_ready_state(&["complete"], limit).await
    }

    async fn find(&mut self, locator: &Locator) -> SessionResult<Vec<ElementSnapshot>> {
        let script = format!(
            "{}.map(el => {{ \
                const attributes = {{}}; \
                for (const a of el.attributes) {{ attributes[a.name] = a.value; }} \
                return {{ text: (el.innerText || el.textContent || '').trim(), attributes }}; \
            }})",
            locate_all_js(locator)
        );
        self.evaluate(script).await
    }

    async fn scroll_into_view(&mut self, locator: &Locator) -> SessionResult<()> {
        let script = format!(
            "(() => {{ const el = {}[0]; if (!el) return false; \
               el.scrollIntoView({{block: 'center'}}); return true; }})()",
            locate_all_js(locator)
        );
        let found: bool = self.evaluate(script).await?;
        if found {
            Ok(())
        } else {
            Err(SessionError::ElementNotFound(locator.to_string()))
        }
    }

    async fn click(&mut self, locator: &Locator) -> SessionResult<()> {
        self.ensure_open()?;
        match locator {
            Locator::Css(selector) => {
                let element = self
                    .page
                    .find_element(selector.as_str())
                    .await
                    .map_err(|_| SessionError::ElementNotFound(locator.to_string()))?;
                element
                    .click()
                    .await
                    .map_err(|e| SessionError::Script(e.to_string()))?;
                Ok(())
            }
            // Text matches have no CDP node handle; dispatch from script instead
            Locator::ButtonText(_) => self.script_click(locator).await,
        }
    }

    async fn script_click(&mut self, locator: &Locator) -> SessionResult<()> {
        let script = format!(
            "(() => {{ const el = {}[0]; if (!el) return false; el.click(); return true; }})()",
            locate_all_js(locator)
        );
        let clicked: bool = self.evaluate(script).await?;
        if clicked {
            Ok(())
        } else {
            Err(SessionError::ElementNotFound(locator.to_string()))
        }
    }

    async fn current_url(&mut self) -> SessionResult<String> {
        self.ensure_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn page_source(&mut self) -> SessionResult<String> {
        self.ensure_open()?;
        self.page
            .content()
            .await
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn close(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let limit = self.script_timeout;
        let result = match timeout(limit, self.browser.close()).await {
            Ok(closed) => closed
                .map(|_| ())
                .map_err(|e| SessionError::Script(format!("failed to close browser: {}", e))),
            Err(_) => Err(SessionError::Timeout {
                what: "browser to close".to_string(),
                seconds: limit.as_secs(),
            }),
        };

        if timeout(limit, self.browser.wait()).await.is_err() {
            tracing::warn!("Chrome did not exit within {}s, killing it", limit.as_secs());
            if let Some(Err(e)) = self.browser.kill().await {
                tracing::debug!("Failed to kill Chrome: {}", e);
            }
        }
        self.handler_task.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::debug!("Could not remove {}: {}", self.profile_dir.display(), e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_all_js_escapes_selector() {
        let js = locate_all_js(&Locator::css(r#"[data-test="button-next"]"#));
        assert_eq!(
            js,
            r#"Array.from(document.querySelectorAll("[data-test=\"button-next\"]"))"#
        );
    }

    #[test]
    fn test_locate_all_js_button_text() {
        let js = locate_all_js(&Locator::button_text("Yes I Accept"));
        assert!(js.contains("querySelectorAll('button')"));
        assert!(js.contains(r#"includes("Yes I Accept")"#));
    }

    #[test]
    fn test_profile_dirs_are_unique() {
        let factory = ChromeSessionFactory::new(BrowserConfig::default());
        assert_ne!(factory.profile_dir(), factory.profile_dir());
    }
}
