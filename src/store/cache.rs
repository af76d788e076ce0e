// src/store/cache.rs
// =============================================================================
// Dedup cache: destination path -> last known content length.
//
// Before writing a file the crawler asks the cache whether the same path was
// already saved with the same length. The question and the update happen in a
// single critical section, so two workers can never both decide that the same
// file is new.
//
// The table is loaded from and persisted to a JSON file between runs.
// =============================================================================

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What `record` decided for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    /// Same length as last time, nothing to write
    Unchanged,
    /// First time this path is seen
    New,
    /// Known path, different length
    Updated { previous: u64 },
}

impl SaveDecision {
    pub fn needs_write(&self) -> bool {
        !matches!(self, SaveDecision::Unchanged)
    }
}

#[derive(Debug, Default)]
pub struct DedupCache {
    entries: Mutex<HashMap<PathBuf, u64>>,
    file: Option<PathBuf>,
}

impl DedupCache {
    // In-memory only, nothing is persisted
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the table stored at `file`, or starts empty when it doesn't exist.
    pub fn load(file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let mut entries = HashMap::new();

        if file.exists() {
            let data = fs::read_to_string(&file)
                .with_context(|| format!("reading dedup cache {}", file.display()))?;
            let stored: BTreeMap<String, u64> = serde_json::from_str(&data)
                .with_context(|| format!("parsing dedup cache {}", file.display()))?;
            entries.extend(stored.into_iter().map(|(k, v)| (PathBuf::from(k), v)));
            tracing::debug!(entries = entries.len(), "loaded dedup cache");
        }

        Ok(Self {
            entries: Mutex::new(entries),
            file: Some(file),
        })
    }

    /// Compares `length` with the cached value and stores it when different.
    pub fn record(&self, path: &Path, length: u64) -> SaveDecision {
        let mut entries = self.lock();

        match entries.insert(path.to_path_buf(), length) {
            None => SaveDecision::New,
            Some(previous) if previous == length => SaveDecision::Unchanged,
            Some(previous) => SaveDecision::Updated { previous },
        }
    }

    // Undoes a `record` whose write never reached the disk
    pub fn rollback(&self, path: &Path, decision: SaveDecision) {
        let mut entries = self.lock();
        match decision {
            SaveDecision::New => {
                entries.remove(path);
            }
            SaveDecision::Updated { previous } => {
                entries.insert(path.to_path_buf(), previous);
            }
            SaveDecision::Unchanged => {}
        }
    }

    #[cfg(test)]
    pub fn get(&self, path: &Path) -> Option<u64> {
        self.lock().get(path).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn persist(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let snapshot: BTreeMap<String, u64> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), *v))
            .collect();

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("writing dedup cache {}", file.display()))?;
        Ok(())
    }

    // A poisoned lock only means another worker panicked mid-update of a
    // plain map; the data is still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, u64>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_same_length_is_unchanged_the_second_time() {
        let cache = DedupCache::new();
        let path = Path::new("/root/Algebra/tema1.pdf");

        assert_eq!(cache.record(path, 100), SaveDecision::New);
        assert_eq!(cache.record(path, 100), SaveDecision::Unchanged);
        assert!(!SaveDecision::Unchanged.needs_write());
    }

    #[test]
    fn test_different_length_is_an_update() {
        let cache = DedupCache::new();
        let path = Path::new("/root/Algebra/tema1.pdf");

        cache.record(path, 100);
        assert_eq!(cache.record(path, 120), SaveDecision::Updated { previous: 100 });
        assert_eq!(cache.get(path), Some(120));
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let cache = DedupCache::new();
        let path = Path::new("/root/x.pdf");

        let decision = cache.record(path, 1);
        cache.rollback(path, decision);
        assert_eq!(cache.get(path), None);

        cache.record(path, 1);
        let decision = cache.record(path, 2);
        cache.rollback(path, decision);
        assert_eq!(cache.get(path), Some(1));
    }

    #[test]
    fn test_concurrent_record_has_one_winner() {
        let cache = Arc::new(DedupCache::new());
        let path = PathBuf::from("/root/shared.pdf");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let path = path.clone();
                std::thread::spawn(move || cache.record(&path, 7))
            })
            .collect();

        let news = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d == SaveDecision::New)
            .count();
        assert_eq!(news, 1);
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".vcd").join("cache.json");

        let cache = DedupCache::load(&file).unwrap();
        cache.record(Path::new("/root/a.pdf"), 10);
        cache.persist().unwrap();

        let reloaded = DedupCache::load(&file).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.record(Path::new("/root/a.pdf"), 10), SaveDecision::Unchanged);
    }
}
