//! Tracing setup for the livesync binary
//!
//! Logs go to ~/.local/share/livesync/logs/livesync.log (or platform
//! equivalent) so they do not interleave with the interactive prompt.
//! `--verbose` sends them to stderr instead.

use config::PathManager;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,livesync_core=debug";

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must be held for the life of the program.
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Option<WorkerGuard> {
    if verbose {
        init_stderr_logging(stderr_default_filter(true));
        return None;
    }

    let Some(path) = log_file.or_else(PathManager::log_file_path) else {
        init_stderr_logging(stderr_default_filter(false));
        return None;
    };

    match open_log_file(&path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            );

            if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!("[livesync] Failed to set tracing subscriber: {}", e);
            }
            tracing::info!("Logging initialized, writing to {:?}", path);
            Some(guard)
        }
        Err(e) => {
            eprintln!("[livesync] Failed to open log file {:?}: {}", path, e);
            init_stderr_logging(stderr_default_filter(false));
            None
        }
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// `--verbose` gets the same directives as the log file; otherwise stderr
/// only carries warnings so the prompt stays readable
fn stderr_default_filter(verbose: bool) -> &'static str {
    if verbose { DEFAULT_FILTER } else { "warn" }
}

fn init_stderr_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
