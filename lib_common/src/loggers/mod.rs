//! # Logging Setup
//!
//! Installs the process-wide `tracing` subscriber used by the binaries:
//! human-readable events on stderr, filtered by `RUST_LOG` (or the configured
//! level when `RUST_LOG` is unset), plus an optional daily log file.
//!
//! When file output is enabled, older log files of the same application are
//! removed at startup so only the newest one is kept.

use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("cannot prepare log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file in {path}: {reason}")]
    Appender { path: PathBuf, reason: String },

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Keeps the background file writer alive. Dropping it flushes pending
/// events, so hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Builds the event filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> Result<EnvFilter, LoggerError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|e| LoggerError::InvalidFilter {
        filter: default_level.to_string(),
        reason: e.to_string(),
    })
}

/// Deletes every `<app_name>.*.log` file in `log_dir` except the newest.
/// Returns how many files were removed.
pub fn rotate_logs(app_name: &str, log_dir: &Path) -> Result<usize, LoggerError> {
    let pattern = format!("{}/{}.*.log", log_dir.display(), app_name);
    let entries = glob(&pattern).map_err(|e| LoggerError::LogDir {
        path: log_dir.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
    })?;

    let mut log_files: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    // Daily files carry the date in their name, so names sort chronologically.
    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let mut removed = 0;
    for old_file in log_files.iter().skip(1) {
        match fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    Ok(removed)
}

fn file_writer(app_name: &str, log_dir: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggerError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggerError::LogDir {
        path: log_dir.to_path_buf(),
        source,
    })?;
    rotate_logs(app_name, log_dir)?;

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(app_name)
        .filename_suffix("log")
        .max_log_files(1)
        .build(log_dir)
        .map_err(|e| LoggerError::Appender {
            path: log_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails on an unparsable level, an unusable log directory, or when another
/// subscriber was installed first.
pub fn init_tracing(app_name: &str, log_dir: Option<&Path>, default_level: &str) -> Result<LogGuard, LoggerError> {
    let filter = env_filter(default_level)?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(app_name, dir)?;
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::AlreadyInstalled(e.to_string()))?;

    Ok(LogGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_only_the_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "node_control.2026-10-13.log",
            "node_control.2026-10-15.log",
            "node_control.2026-10-14.log",
            "best_node.2026-10-01.log",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        assert_eq!(rotate_logs("node_control", dir.path()).unwrap(), 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, ["best_node.2026-10-01.log", "node_control.2026-10-15.log", "notes.txt"]);
    }

    #[test]
    fn rotation_of_an_empty_dir_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(rotate_logs("node_control", dir.path()).unwrap(), 0);
    }

    #[test]
    fn file_writer_creates_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs/nested");
        let (_writer, _guard) = file_writer("node_control", &nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn bad_level_is_reported() {
        // Only meaningful when RUST_LOG does not override the level.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(env_filter("lib_common=bogus"), Err(LoggerError::InvalidFilter { .. })));
            assert!(env_filter("debug").is_ok());
        }
    }
}
