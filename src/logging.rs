//! Tracing setup for the detector.
//!
//! One subscriber fans out to stdout and, unless disabled, to a per-launch
//! file under the app root's `logs` folder. Only the newest files are kept.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use crate::app_dirs;
use crate::config::LoggingSettings;

const LOG_FILE_PREFIX: &str = "touchalert";

static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The app root or its `logs` folder could not be prepared.
    #[error("Log directory unavailable: {0}")]
    Dir(#[from] app_dirs::AppDirError),
    /// Failed to enumerate existing log files for pruning.
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to remove an obsolete log file.
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to format a timestamp for the log filename.
    #[error("Failed to format log filename time: {0}")]
    FormatTime(time::error::Format),
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
    /// Failed to create the log file for this launch.
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Install the global subscriber described by `settings`.
///
/// Subsequent calls are no-ops. Failures are returned so the binary can carry
/// on with stderr only.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let timer = build_timer();
    let stdout_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_target(false)
        .with_writer(std::io::stdout)
        .boxed();

    let (file_layer, guard, log_path) = if settings.write_file {
        let log_dir = app_dirs::logs_dir()?;
        let log_file_name = format_log_file_name(now_local_or_utc())?;
        let log_path = log_dir.join(&log_file_name);
        ensure_file_exists(&log_path)?;
        prune_old_logs(&log_dir, settings.max_files)?;
        let (writer, guard) = tracing_appender::non_blocking(rolling::never(&log_dir, &log_file_name));
        let layer = fmt::layer()
            .with_ansi(false)
            .with_timer(timer)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard), Some(log_path))
    } else {
        (None, None, None)
    };

    let subscriber = Registry::default()
        .with(build_env_filter(&settings.default_filter))
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = LOG_GUARD.set(guard);

    match log_path {
        Some(path) => tracing::info!("Logging initialized; log file at {}", path.display()),
        None => tracing::info!("Logging initialized; file output disabled"),
    }
    Ok(())
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete the oldest `.log` files in `dir` until at most `keep` remain.
///
/// The file about to be written counts towards `keep`.
fn prune_old_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect::<Vec<_>>();

    if logs.len() <= keep {
        return Ok(());
    }
    logs.sort_by_key(|(modified, _)| *modified);
    let excess = logs.len() - keep;
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

fn format_log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let name = now.format(NAME_FORMAT).map_err(LoggingError::FormatTime)?;
    Ok(format!("{LOG_FILE_PREFIX}_{name}.log"))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `RUST_LOG` wins over the configured directive.
fn build_env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
