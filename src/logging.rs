//! Logging setup for spotify-backup
//!
//! Every run logs to stderr and, in plain text, to a daily rotating file so that
//! unattended (cron) runs leave a trail behind.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "spotify-backup";

/// Initialize the logging system.
///
/// Logs are written to stderr and to `.logs/spotify-backup.YYYY-MM-DD`.
/// `RUST_LOG` takes precedence; otherwise this crate logs at `level` and everything
/// else at WARN.
///
/// The returned guard flushes the file writer when dropped and must be held until exit.
pub fn init_logging(level: &str) -> anyhow::Result<WorkerGuard> {
    let log_dir = Path::new(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(level))?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging initialized - logs written to {}/", LOG_DIR);

    Ok(guard)
}

fn default_directives(level: &str) -> String {
    format!("spotify_backup={},warn", level.to_ascii_lowercase())
}
