//! End-of-run summary

use crate::state::WalkState;
use std::fmt::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Detail-scraping totals for a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailTotals {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub newly_recorded_failures: usize,
    pub batches: usize,
}

impl DetailTotals {
    pub fn success_rate(&self) -> f64 {
        if self.scheduled == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.scheduled as f64 * 100.0
        }
    }
}

/// Everything a scrape run reports back to the user
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub category_url: String,
    pub product_type: String,
    pub walk_state: WalkState,
    pub pages_scraped: u32,
    pub resumed_from: Option<u32>,
    pub products: usize,
    pub basic_file: Option<PathBuf>,
    pub details: Option<DetailTotals>,
    pub complete_file: Option<PathBuf>,
    pub failure_ledger: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Formats a run summary for the terminal
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_summary(&mut out, summary);
    out
}

fn write_summary(out: &mut String, summary: &RunSummary) -> fmt::Result {
    writeln!(out, "=== Scrape Summary ===\n")?;
    writeln!(out, "Listing:")?;
    writeln!(out, "  Category: {} ({})", summary.product_type, summary.category_url)?;
    writeln!(out, "  Pages scraped: {}", summary.pages_scraped)?;
    if let Some(page) = summary.resumed_from {
        writeln!(out, "  Resumed from page: {}", page)?;
    }
    writeln!(out, "  Products: {}", summary.products)?;
    writeln!(out, "  Walk ended: {}", summary.walk_state)?;
    if let Some(path) = &summary.basic_file {
        writeln!(out, "  Saved to: {}", path.display())?;
    }
    writeln!(out)?;

    if let Some(details) = &summary.details {
        writeln!(out, "Details:")?;
        writeln!(
            out,
            "  Succeeded: {} / {} ({:.1}%)",
            details.succeeded,
            details.scheduled,
            details.success_rate()
        )?;
        writeln!(out, "  Failed: {}", details.failed)?;
        if details.skipped > 0 {
            writeln!(out, "  Not scraped (over limit): {}", details.skipped)?;
        }
        writeln!(out, "  Batches written: {}", details.batches)?;
        if let Some(path) = &summary.complete_file {
            writeln!(out, "  Saved to: {}", path.display())?;
        }
        if details.newly_recorded_failures > 0 {
            if let Some(path) = &summary.failure_ledger {
                writeln!(
                    out,
                    "  {} failures recorded in {}",
                    details.newly_recorded_failures,
                    path.display()
                )?;
            }
        }
        writeln!(out)?;
    }

    if summary.walk_state == WalkState::Interrupted {
        writeln!(out, "Interrupted: run again to resume from the saved progress.")?;
    }
    write!(out, "Elapsed: {:.1}s", summary.elapsed.as_secs_f64())
}

/// Prints a run summary to stdout
pub fn print_run_summary(summary: &RunSummary) {
    println!("{}", format_run_summary(summary));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            category_url: "https://www.hollandandbarrett.com/shop/vitamins-supplements/".to_string(),
            product_type: "vitamins-supplements".to_string(),
            walk_state: WalkState::Done,
            pages_scraped: 3,
            resumed_from: None,
            products: 60,
            basic_file: Some(PathBuf::from("data/output/products_basic.csv")),
            details: None,
            complete_file: None,
            failure_ledger: None,
            elapsed: Duration::from_secs(42),
        }
    }

    #[test]
    fn test_listing_only_summary() {
        let text = format_run_summary(&summary());
        assert!(text.contains("Pages scraped: 3"));
        assert!(text.contains("Products: 60"));
        assert!(text.contains("Walk ended: done"));
        assert!(!text.contains("Details:"));
        assert!(text.ends_with("Elapsed: 42.0s"));
    }

    #[test]
    fn test_detail_summary() {
        let mut s = summary();
        s.details = Some(DetailTotals {
            scheduled: 10,
            succeeded: 8,
            failed: 2,
            skipped: 50,
            newly_recorded_failures: 2,
            batches: 1,
        });
        s.failure_ledger = Some(PathBuf::from("data/output/failed_products.json"));

        let text = format_run_summary(&s);
        assert!(text.contains("Succeeded: 8 / 10 (80.0%)"));
        assert!(text.contains("Not scraped (over limit): 50"));
        assert!(text.contains("2 failures recorded in data/output/failed_products.json"));
    }

    #[test]
    fn test_interrupted_summary_mentions_resume() {
        let mut s = summary();
        s.walk_state = WalkState::Interrupted;
        assert!(format_run_summary(&s).contains("resume"));
    }
}
