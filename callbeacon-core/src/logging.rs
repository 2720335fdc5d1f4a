//! Logging infrastructure for callbeacon
//!
//! Logs are written to `~/.local/state/callbeacon/callbeacon.log` following XDG standards.
//! The telemetry pipeline only ever emits `tracing` events (skew lookups,
//! dispatched batches, swallowed upload failures); installing a subscriber is
//! left to the host, and [`init`] is the one the CLI uses.

use crate::config::{Config, LoggingConfig};
use crate::error::Result;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system
///
/// Sets up tracing with:
/// - File output to XDG state directory, rotated daily
/// - An optional compact copy on stderr, so pipeline activity shows up next
///   to command output
/// - `RUST_LOG` when set, otherwise the configured `logging.level`
pub fn init(config: &LoggingConfig, echo_stderr: bool) -> Result<LoggingGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level_filter()?.into())
        .from_env_lossy();

    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "callbeacon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let stderr_layer = echo_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    tracing::debug!(
        log_dir = %log_dir.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests
///
/// Pipeline events go to the test writer so they show up under
/// `--nocapture` or next to a failing test. `RUST_LOG` overrides the default
/// `callbeacon_core=debug`.
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("callbeacon_core=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Guard that keeps the file writer alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path (the rolling appender adds a date suffix)
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
