//! Browser session abstraction
//!
//! Scraping logic talks to the browser only through [`BrowserSession`], which
//! keeps the extractors, the pagination walker and the executor independent of
//! the automation driver and lets tests substitute scripted sessions.

use crate::SessionResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Identifies elements on the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// A CSS selector
    Css(String),
    /// A `<button>` whose text contains the given string
    ButtonText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn button_text(text: impl Into<String>) -> Self {
        Self::ButtonText(text.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css={}", selector),
            Self::ButtonText(text) => write!(f, "button~={}", text),
        }
    }
}

/// A detached copy of an element's text and attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementSnapshot {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// True when the element is marked disabled by attribute, ARIA state or class
    pub fn is_disabled(&self) -> bool {
        self.attr("disabled")
            .map(|v| v.is_empty() || v == "true" || v == "disabled")
            .unwrap_or(false)
            || self.attr("aria-disabled") == Some("true")
            || self
                .attr("class")
                .map(|c| c.contains("disabled"))
                .unwrap_or(false)
    }
}

/// An isolated browser-automation handle
///
/// Each session owns its own browser process and profile. Implementations
/// must report every driver failure as a [`crate::SessionError`] value.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` according to the session's page-load strategy
    async fn navigate(&mut self, url: &str) -> SessionResult<()>;

    /// Waits until `locator` matches at least one element
    ///
    /// Returns `Ok(false)` when the timeout elapses first.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<bool>;

    /// Waits until the document has fully loaded
    ///
    /// Returns `Ok(false)` when the timeout elapses first.
    async fn wait_until_ready(&mut self, timeout: Duration) -> SessionResult<bool>;

    /// Snapshots every element matching `locator`
    async fn find(&mut self, locator: &Locator) -> SessionResult<Vec<ElementSnapshot>>;

    /// Scrolls the first match into the centre of the viewport
    async fn scroll_into_view(&mut self, locator: &Locator) -> SessionResult<()>;

    /// Clicks the first match with a simulated pointer interaction
    async fn click(&mut self, locator: &Locator) -> SessionResult<()>;

    /// Clicks the first match by dispatching `click()` from script
    async fn script_click(&mut self, locator: &Locator) -> SessionResult<()>;

    async fn current_url(&mut self) -> SessionResult<String>;

    /// The rendered document as HTML
    async fn page_source(&mut self) -> SessionResult<String>;

    /// Shuts the session down; further calls fail with `SessionError::Closed`
    async fn close(&mut self) -> SessionResult<()>;
}

/// Produces independent browser sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self, headless: bool) -> SessionResult<Box<dyn BrowserSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(attrs: &[(&str, &str)]) -> ElementSnapshot {
        ElementSnapshot {
            text: String::new(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_is_disabled() {
        assert!(!snapshot(&[("data-test", "button-next")]).is_disabled());
        assert!(snapshot(&[("disabled", "true")]).is_disabled());
        assert!(snapshot(&[("disabled", "")]).is_disabled());
        assert!(snapshot(&[("aria-disabled", "true")]).is_disabled());
        assert!(snapshot(&[("class", "btn btn--disabled")]).is_disabled());
        assert!(!snapshot(&[("aria-disabled", "false")]).is_disabled());
    }

    #[test]
    fn test_snapshot_deserializes_from_script_result() {
        let value = serde_json::json!({
            "text": "2",
            "attributes": {"aria-current": "page"}
        });
        let parsed: ElementSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.text, "2");
        assert_eq!(parsed.attr("aria-current"), Some("page"));
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("#next").to_string(), "css=#next");
        assert_eq!(Locator::button_text("Accept").to_string(), "button~=Accept");
    }
}
