// src/store/downloads_log.rs
// =============================================================================
// Append-only record of every file written during a crawl.
//
// One line per save:
//   Downloaded <subject-name> -- <file-basename>
// =============================================================================

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct DownloadsLog {
    file: Option<Mutex<File>>,
}

impl DownloadsLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening downloads log {}", path.display()))?;

        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    // Used by tests that don't care about the log
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn record(&self, subject: &str, saved: &Path) {
        let Some(file) = &self.file else {
            return;
        };

        let basename = saved
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(file, "Downloaded {subject} -- {basename}") {
            tracing::warn!(error = %e, "could not append to downloads log");
        }
    }
}
