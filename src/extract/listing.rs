//! Listing page extraction
//!
//! This module handles reading product cards off a category listing:
//! - Waiting for the cards to render
//! - Reading brand, name, price, image and link from each card
//! - Resolving relative card links against the page URL

use crate::browser::{default_popup_strategies, dismiss_popups, BrowserSession, Locator};
use crate::extract::fields::Extracted;
use crate::item::{Item, ProductFields};
use crate::SessionResult;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

/// Matches a product card under either test attribute the site has used
pub const CARD_SELECTOR: &str = r#"[data-testid="product-card"], [data-test="product-card"]"#;

/// How long to wait for cards to render before treating the page as empty
pub const DEFAULT_CARD_WAIT: Duration = Duration::from_secs(10);

/// Primary selector first, then the styling-class fallback
const BRAND: [&str; 2] = [
    r#"[data-test="product-card-brand-name"]"#,
    ".ProductCard-module_productBrand__-rFtT",
];
const TITLE: [&str; 2] = [
    r#"[data-test="product-card-title"]"#,
    ".ProductCard-module_title__ytKYE",
];
const PRICE: [&str; 2] = [
    r#"[data-test="product-card-price"]"#,
    ".MppProductCardPrice-module_price__bold__BpYBE",
];
const IMAGE: [&str; 2] = [
    r#"[data-test="product-image"]"#,
    ".ProductCard-module_productImage__9bfwO",
];

/// Reads product cards from listing pages
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    card_wait: Duration,
    popup_strategies: Vec<Locator>,
    popup_settle: Duration,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self {
            card_wait: DEFAULT_CARD_WAIT,
            popup_strategies: default_popup_strategies(),
            popup_settle: Duration::from_secs(1),
        }
    }
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_card_wait(mut self, wait: Duration) -> Self {
        self.card_wait = wait;
        self
    }

    pub fn with_popup_settle(mut self, settle: Duration) -> Self {
        self.popup_settle = settle;
        self
    }

    pub fn card_locator() -> Locator {
        Locator::css(CARD_SELECTOR)
    }

    pub fn card_wait(&self) -> Duration {
        self.card_wait
    }

    /// Loads `url` and returns one stub item per product card
    ///
    /// A page whose cards never render yields an empty list; that is logged
    /// but is not an error. Driver failures propagate.
    pub async fn extract(&self, session: &mut dyn BrowserSession, url: &str) -> SessionResult<Vec<Item>> {
        tracing::info!("Loading listing page {}", url);
        session.navigate(url).await?;
        dismiss_popups(session, &self.popup_strategies, self.popup_settle).await;

        if !session.wait_for(&Self::card_locator(), self.card_wait).await? {
            tracing::error!(
                "No product cards appeared on {} within {}s",
                url,
                self.card_wait.as_secs()
            );
            return Ok(Vec::new());
        }

        let html = session.page_source().await?;
        let page_url = session.current_url().await?;
        let base = if page_url.is_empty() { url } else { page_url.as_str() };

        let items: Vec<Item> = parse_cards(&html, base)
            .into_iter()
            .map(Item::stub)
            .collect();

        tracing::info!("Found {} products on {}", items.len(), base);
        for (idx, item) in items.iter().enumerate() {
            tracing::debug!("  [{}] {} - {}", idx + 1, item.product.brand, item.label());
        }

        Ok(items)
    }
}

/// Parses every product card in a rendered listing
///
/// # Arguments
///
/// * `html` - The rendered page source
/// * `page_url` - The URL the page was served from, for resolving card links
///
/// Fields are read independently: a card missing its price still yields its
/// brand, name, image and link.
pub fn parse_cards(html: &str, page_url: &str) -> Vec<ProductFields> {
    let document = Html::parse_document(html);
    let Ok(card_selector) = Selector::parse(CARD_SELECTOR) else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();

    document
        .select(&card_selector)
        .map(|card| ProductFields {
            brand: field_text(card, &BRAND).unwrap_or_default(),
            name: field_text(card, &TITLE).unwrap_or_default(),
            price: field_text(card, &PRICE).unwrap_or_default(),
            image: field_image(card, &IMAGE).unwrap_or_default(),
            url: card_link(card)
                .into_option()
                .map(|href| resolve_link(&href, base.as_ref()))
                .unwrap_or_default(),
        })
        .collect()
}

/// First non-empty match among `selectors`, tried in order
fn first_match<'a>(card: ElementRef<'a>, selectors: &[&str]) -> Extracted<ElementRef<'a>> {
    selectors.iter().fold(Extracted::NotFound, |found, css| {
        found.or_else(|| {
            Selector::parse(css)
                .ok()
                .and_then(|selector| card.select(&selector).next())
                .into()
        })
    })
}

fn field_text(card: ElementRef<'_>, selectors: &[&str]) -> Extracted<String> {
    match first_match(card, selectors) {
        Extracted::Found(element) => {
            Extracted::Found(element.text().collect::<String>().trim().to_string())
        }
        Extracted::NotFound => {
            tracing::debug!("Card field {} not found", selectors[0]);
            Extracted::NotFound
        }
    }
}

/// The image `src`, from the matched element or an `<img>` nested inside it
fn field_image(card: ElementRef<'_>, selectors: &[&str]) -> Extracted<String> {
    let Extracted::Found(element) = first_match(card, selectors) else {
        return Extracted::NotFound;
    };

    if let Some(src) = element.value().attr("src") {
        return Extracted::Found(src.to_string());
    }

    Selector::parse("img[src]")
        .ok()
        .and_then(|img| element.select(&img).next())
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
        .into()
}

/// The card's own `href`, or the first link inside it
fn card_link(card: ElementRef<'_>) -> Extracted<String> {
    if let Some(href) = card.value().attr("href") {
        return Extracted::Found(href.to_string());
    }

    Selector::parse("a[href]")
        .ok()
        .and_then(|a| card.select(&a).next())
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
        .into()
}

/// Resolves a card link against the page URL, keeping it as-is when that fails
fn resolve_link(href: &str, base: Option<&Url>) -> String {
    let href = href.trim();
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
