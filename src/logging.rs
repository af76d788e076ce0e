// src/logging.rs
// =============================================================================
// tracing subscriber setup: a log file under the log directory, or stderr
// when that directory can't be used.
// =============================================================================

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "vcd.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vcd=debug"))
}

/// Initialize structured logging to `<log_dir>/vcd.log`.
///
/// Stdout is left for the per-file "New file" / "File updated" lines and the
/// final summary, so everything tracing emits goes to the file. `RUST_LOG`
/// overrides the default filter.
pub fn init(log_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let log_file_path = log_dir.join(LOG_FILE);

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .with_context(|| format!("opening log file {}", log_file_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::info!("vcd logging initialized at {}", log_file_path.display());

    Ok(log_file_path)
}

/// Fallback when the log file can't be opened.
pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}
