//! Tracing subscriber setup.
//!
//! Two modes, picked by `server.production`:
//! - **production**: JSON lines to a daily rolling file, compact lines to stdout
//! - **development**: pretty stdout with span open/close events
//!
//! The filter comes from `RUST_LOG`, then [`LOG_LEVEL_ENV`], then `info`.

use std::path::PathBuf;
use std::sync::OnceLock;

use safezone_core::ServerConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Writer guards, held for the life of the process so buffered lines are flushed.
static GUARDS: OnceLock<Vec<WorkerGuard>> = OnceLock::new();

/// Fallback filter variable, read when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "SAFEZONE_LOG_LEVEL";

/// Prefix of rolling log file names.
const LOG_FILE_PREFIX: &str = "safezone";

/// Install the global subscriber for `config`.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or the log
/// directory cannot be created.
pub fn init(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = env_filter()?;

    if config.production {
        let dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
        init_production(filter, &dir)?;
    } else {
        init_development(filter);
    }

    Ok(())
}

fn env_filter() -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    Ok(EnvFilter::try_new(level)?)
}

fn init_production(filter: EnvFilter, dir: &std::path::Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout_writer)
                .with_ansi(false),
        )
        .init();

    let _ = GUARDS.set(vec![file_guard, stdout_guard]);
    Ok(())
}

fn init_development(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
        )
        .init();
}

/// `/var/log/safezone` on Linux, the platform data directory elsewhere.
fn default_log_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        return PathBuf::from("/var/log/safezone");
    }
    directories::ProjectDirs::from("", "", "safezone")
        .map_or_else(|| PathBuf::from("logs"), |dirs| dirs.data_dir().join("logs"))
}
