//! Page extraction
//!
//! Listing pages yield stub items from product cards; detail pages yield the
//! enrichment fields from the page's embedded JSON payload.

mod detail;
mod fields;
mod listing;
pub mod payload;

pub use detail::{DetailExtractor, DetailScraper};
pub use fields::Extracted;
pub use listing::{parse_cards, ListingExtractor, CARD_SELECTOR, DEFAULT_CARD_WAIT};
