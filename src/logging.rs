//! Logging setup
//!
//! Console output is filtered by the verbosity flags. When a log directory is
//! configured, a second layer writes debug-level records to a daily-rolling
//! file through a non-blocking writer.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "hb_scraper.log";

/// Keeps the file writer flushing until dropped
///
/// Hold this for the lifetime of the program; dropping it early loses
/// buffered file output.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Console filter for the given verbosity
pub fn console_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::new("hb_scraper=info,warn"),
        1 => EnvFilter::new("hb_scraper=debug,info"),
        2 => EnvFilter::new("hb_scraper=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs the global subscriber
///
/// # Arguments
///
/// * `verbose` - Number of `-v` flags
/// * `quiet` - Only errors reach the console
/// * `log_dir` - Directory for daily log files; console only when `None`
pub fn init_logging(verbose: u8, quiet: bool, log_dir: Option<&Path>) -> LoggingGuard {
    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(console_filter(verbose, quiet));

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::new("hb_scraper=debug,warn"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
    if let Err(e) = installed {
        eprintln!("Logging was already initialised: {}", e);
    }

    if let Some(dir) = log_dir {
        tracing::debug!("Writing log files to {}", dir.display());
    }

    LoggingGuard { _file: guard }
}
