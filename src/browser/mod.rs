//! Browser automation layer
//!
//! This module contains:
//! - The `BrowserSession` / `SessionFactory` traits the scraper is written against
//! - A Chrome implementation over the DevTools protocol
//! - In-memory fixture sessions replaying saved HTML
//! - Consent pop-up dismissal shared by every page visit

mod chrome;
mod fixture;
mod popup;
mod session;

pub use chrome::{ChromeSession, ChromeSessionFactory};
pub use fixture::{FixtureSession, FixtureSessionFactory};
pub use popup::{default_popup_strategies, dismiss_popups};
pub use session::{BrowserSession, ElementSnapshot, Locator, SessionFactory};
