//! Failure ledger statistics
//!
//! Groups ledger entries by the day they failed and by a coarse error kind,
//! so a user can judge whether a retry is worth running.

use crate::storage::FailureRecord;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};

/// Coarse classification of a recorded error
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The host could not be reached at all
    Network,
    /// The page loaded but its product payload was missing
    DataExtraction,
    Timeout,
    /// Anything else, keyed by the first 50 characters of the message
    Other(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "Network unreachable"),
            Self::DataExtraction => write!(f, "Page data extraction failed"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Other(prefix) => write!(f, "{}", prefix),
        }
    }
}

/// Classifies an error message
pub fn classify_error(error: &str) -> ErrorKind {
    let lower = error.to_lowercase();
    if error.contains("Could not reach host") || error.contains("net::ERR_") {
        ErrorKind::Network
    } else if error.contains("__LAYOUT__") {
        ErrorKind::DataExtraction
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Other(error.chars().take(50).collect())
    }
}

/// Counts over a failure ledger
#[derive(Debug, Clone, Default)]
pub struct FailureStatistics {
    pub total: usize,
    /// Failures per calendar date, newest first when iterated in reverse
    pub by_date: BTreeMap<String, usize>,
    /// Failures per error kind, most frequent first
    pub by_kind: Vec<(ErrorKind, usize)>,
}

/// Builds statistics from ledger entries
pub fn summarize_failures(records: &[FailureRecord]) -> FailureStatistics {
    let mut by_date = BTreeMap::new();
    let mut kinds: HashMap<ErrorKind, usize> = HashMap::new();

    for record in records {
        let date = record.date().unwrap_or("unknown date").to_string();
        *by_date.entry(date).or_insert(0) += 1;
        *kinds.entry(classify_error(&record.error)).or_insert(0) += 1;
    }

    let mut by_kind: Vec<_> = kinds.into_iter().collect();
    by_kind.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));

    FailureStatistics {
        total: records.len(),
        by_date,
        by_kind,
    }
}

/// Formats failure statistics for the terminal
pub fn format_failure_summary(stats: &FailureStatistics) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_failure_summary(&mut out, stats);
    out
}

fn write_failure_summary(out: &mut String, stats: &FailureStatistics) -> fmt::Result {
    writeln!(out, "=== Failed Products ({}) ===\n", stats.total)?;

    writeln!(out, "By date:")?;
    for (date, count) in stats.by_date.iter().rev() {
        writeln!(out, "  {}: {} failed", date, count)?;
    }
    writeln!(out)?;

    writeln!(out, "By error:")?;
    for (kind, count) in &stats.by_kind {
        writeln!(out, "  - {}: {}", kind, count)?;
    }
    Ok(())
}

/// Prints failure statistics to stdout
pub fn print_failure_summary(stats: &FailureStatistics) {
    print!("{}", format_failure_summary(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;

    fn record(error: &str, timestamp: &str) -> FailureRecord {
        let mut record = FailureRecord::new(Item::default(), error);
        record.timestamp = timestamp.to_string();
        record
    }

    #[test]
    fn test_classify_error() {
        assert_eq!(
            classify_error("Message: unknown error: Could not reach host. Are you offline?"),
            ErrorKind::Network
        );
        assert_eq!(
            classify_error("Navigation to https://x failed: net::ERR_NAME_NOT_RESOLVED"),
            ErrorKind::Network
        );
        assert_eq!(classify_error("No __LAYOUT__ data found"), ErrorKind::DataExtraction);
        assert_eq!(
            classify_error("Timed out after 60s waiting for navigation"),
            ErrorKind::Timeout
        );
        assert_eq!(classify_error("Read TIMEOUT"), ErrorKind::Timeout);

        let long = "x".repeat(80);
        assert_eq!(classify_error(&long), ErrorKind::Other("x".repeat(50)));
    }

    #[test]
    fn test_summarize_failures() {
        let records = vec![
            record("Timed out after 60s", "2025-01-02T10:00:00.000000"),
            record("Timed out after 60s", "2025-01-03T10:00:00.000000"),
            record("Could not reach host", "2025-01-03T11:00:00.000000"),
            record("odd", "garbage"),
        ];

        let stats = summarize_failures(&records);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_date.get("2025-01-03"), Some(&2));
        assert_eq!(stats.by_date.get("2025-01-02"), Some(&1));
        assert_eq!(stats.by_date.get("unknown date"), Some(&1));
        assert_eq!(stats.by_kind[0], (ErrorKind::Timeout, 2));
    }

    #[test]
    fn test_format_lists_newest_date_first() {
        let records = vec![
            record("a", "2025-01-01T00:00:00"),
            record("b", "2025-02-01T00:00:00"),
        ];
        let text = format_failure_summary(&summarize_failures(&records));

        let feb = text.find("2025-02-01").unwrap();
        let jan = text.find("2025-01-01").unwrap();
        assert!(feb < jan);
        assert!(text.starts_with("=== Failed Products (2) ==="));
    }
}
