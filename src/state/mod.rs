//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `WalkState`: Where a pagination walk is (page loaded, advancing, done, etc.)
//! - `CrawlProgress`: The resumable snapshot written after each listing page
//! - `ProgressStore`: Loads, saves and clears that snapshot on disk

mod progress;
mod walk_state;

// Re-export main types
pub use progress::{CrawlProgress, ProgressStore};
pub use walk_state::WalkState;
