//! Logging for devicehub
//!
//! Events go to daily files `devicehub.log.YYYY-MM-DD` under the XDG state
//! directory (`~/.local/state/devicehub/`). Only `max_files` days are kept.

use crate::config::{Config, LoggingConfig};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of every log file; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "devicehub.log";

/// Directory holding the log files.
pub fn log_dir() -> PathBuf {
    Config::state_dir()
}

/// Install the global subscriber writing to rotating files in [`log_dir`].
///
/// `RUST_LOG` takes precedence over `config.level`. Keep the returned guard
/// alive for the whole process; dropping it flushes pending lines.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let dir = log_dir();
    let (writer, guard) = file_writer(&dir, config.max_files)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(log_dir = %dir.display(), level = %config.level, "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

fn file_writer(dir: &Path, max_files: usize) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(max_files)
        .build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Route events to the test harness output. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keeps the background log writer running until dropped.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}
