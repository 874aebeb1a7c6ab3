//! Network connectivity diagnostics
//!
//! Sends HEAD requests to a well-known reference host and to the target
//! site's origin. Any HTTP response counts as reachable; only transport
//! failures such as DNS errors or timeouts fail a check.

use crate::config::Config;
use crate::Result;
use reqwest::Client;
use std::fmt::{self, Write};
use std::time::{Duration, Instant};
use url::Url;

/// A host that answers from practically every network
pub const REFERENCE_HOST: &str = "https://www.google.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of probing one URL
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub url: String,
    /// HTTP status, when a response arrived
    pub status: Option<u16>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl CheckResult {
    pub fn is_reachable(&self) -> bool {
        self.status.is_some()
    }
}

/// All checks of a diagnostics run
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    pub checks: Vec<CheckResult>,
}

impl DiagnosticReport {
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.is_reachable()).count()
    }

    pub fn failed(&self) -> usize {
        self.checks.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Formats the report for the terminal
    pub fn format(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "=== Network Check ===\n")?;
        for check in &self.checks {
            match (check.status, &check.error) {
                (Some(status), _) => writeln!(
                    out,
                    "  [ok]   {} ({}): HTTP {} in {}ms",
                    check.name,
                    check.url,
                    status,
                    check.elapsed.as_millis()
                )?,
                (None, error) => writeln!(
                    out,
                    "  [fail] {} ({}): {}",
                    check.name,
                    check.url,
                    error.as_deref().unwrap_or("no response")
                )?,
            }
        }
        writeln!(out)?;
        write!(out, "Passed: {}, Failed: {}", self.passed(), self.failed())?;
        if !self.all_passed() {
            write!(
                out,
                "\nUnreachable hosts usually point to a proxy or DNS problem."
            )?;
        }
        Ok(())
    }
}

/// Builds the client used for diagnostics
pub fn build_diagnostic_client(user_agent: &str) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Sends a HEAD request to `url`
pub async fn check_url(client: &Client, name: &str, url: &str) -> CheckResult {
    let started = Instant::now();
    let (status, error) = match client.head(url).send().await {
        Ok(response) => (Some(response.status().as_u16()), None),
        Err(e) => {
            let reason = if e.is_timeout() {
                format!("timed out: {}", e)
            } else if e.is_connect() {
                format!("could not connect: {}", e)
            } else {
                e.to_string()
            };
            (None, Some(reason))
        }
    };

    let result = CheckResult {
        name: name.to_string(),
        url: url.to_string(),
        status,
        error,
        elapsed: started.elapsed(),
    };
    if result.is_reachable() {
        tracing::debug!("{} reachable ({:?})", url, result.status);
    } else {
        tracing::warn!("{} unreachable: {:?}", url, result.error);
    }
    result
}

/// Probes each `(name, url)` target in turn
pub async fn run_checks(client: &Client, targets: &[(&str, String)]) -> DiagnosticReport {
    let mut checks = Vec::with_capacity(targets.len());
    for (name, url) in targets {
        checks.push(check_url(client, name, url).await);
    }
    DiagnosticReport { checks }
}

/// Checks the reference host and the origin of the configured category
pub async fn run_diagnostics(config: &Config) -> Result<DiagnosticReport> {
    let origin = Url::parse(&config.scraper.category_url)?
        .origin()
        .ascii_serialization();
    let client = build_diagnostic_client(&config.browser.user_agent)?;

    let targets = [
        ("Reference host", REFERENCE_HOST.to_string()),
        ("Target site", origin),
    ];
    Ok(run_checks(&client, &targets).await)
}
