//! Consent pop-up dismissal

use crate::browser::session::{BrowserSession, Locator};
use std::time::Duration;

/// Ordered dismissal strategies; the first click that succeeds wins
pub fn default_popup_strategies() -> Vec<Locator> {
    vec![
        Locator::button_text("Yes I Accept"),
        Locator::button_text("Accept"),
        Locator::css("#onetrust-accept-btn-handler"),
    ]
}

/// Tries each strategy in order and stops at the first successful click
///
/// Never fails: a page without a pop-up is the common case, and any driver
/// error here is logged and skipped.
pub async fn dismiss_popups(
    session: &mut dyn BrowserSession,
    strategies: &[Locator],
    settle: Duration,
) -> bool {
    for locator in strategies {
        match session.find(locator).await {
            Ok(found) if found.is_empty() => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Pop-up probe {} failed: {}", locator, e);
                continue;
            }
        }

        match session.click(locator).await {
            Ok(()) => {
                tracing::info!("Dismissed consent pop-up via {}", locator);
                tokio::time::sleep(settle).await;
                return true;
            }
            Err(e) => tracing::debug!("Pop-up click {} failed: {}", locator, e),
        }
    }

    tracing::debug!("No consent pop-up found");
    false
}
