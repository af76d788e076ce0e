// src/store/alias.rs
// =============================================================================
// Path alias registry.
//
// Course and folder names on the portal can be long enough that the joined
// destination path no longer fits the filesystem. Such paths are replaced by
// a short alias named after a SHA-256 hash of the source URL, so the same URL
// always maps to the same alias, in this run and in the next one.
//
// Limits:
// - the whole path is measured in characters (`max_path_len`)
// - every component is measured in bytes (NAME_MAX), as the OS does
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Longest single path component accepted by ext4, NTFS and APFS.
pub const NAME_MAX: usize = 255;

const HASH_CHARS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub hash: String,
    pub url: String,
    /// Logical destination, used in logs and reports
    pub real: PathBuf,
    /// Path actually used for I/O
    pub alias: PathBuf,
}

#[derive(Debug, Default)]
struct Tables {
    by_hash: HashMap<String, AliasEntry>,
    by_real: HashMap<PathBuf, String>,
    by_alias: HashMap<PathBuf, String>,
}

impl Tables {
    fn insert(&mut self, entry: AliasEntry) {
        if let Some(old) = self.by_hash.get(&entry.hash) {
            self.by_real.remove(&old.real);
            self.by_alias.remove(&old.alias);
        }
        self.by_real.insert(entry.real.clone(), entry.hash.clone());
        self.by_alias.insert(entry.alias.clone(), entry.hash.clone());
        self.by_hash.insert(entry.hash.clone(), entry);
    }
}

#[derive(Debug)]
pub struct AliasRegistry {
    tables: Mutex<Tables>,
    max_path_len: usize,
    file: Option<PathBuf>,
}

impl AliasRegistry {
    #[cfg(test)]
    pub fn new(max_path_len: usize) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            max_path_len,
            file: None,
        }
    }

    pub fn load(file: impl Into<PathBuf>, max_path_len: usize) -> Result<Self> {
        let file = file.into();
        let mut tables = Tables::default();

        if file.exists() {
            let data = fs::read_to_string(&file)
                .with_context(|| format!("reading alias table {}", file.display()))?;
            let entries: Vec<AliasEntry> = serde_json::from_str(&data)
                .with_context(|| format!("parsing alias table {}", file.display()))?;
            for entry in entries {
                tables.insert(entry);
            }
        }

        Ok(Self {
            tables: Mutex::new(tables),
            max_path_len,
            file: Some(file),
        })
    }

    /// Whether `path` can be used as is.
    pub fn fits(&self, path: &Path) -> bool {
        path.to_string_lossy().chars().count() <= self.max_path_len
            && path
                .components()
                .all(|c| c.as_os_str().len() <= NAME_MAX)
    }

    /// Returns the path to use for I/O: `real` itself when it fits, otherwise
    /// a hash-named file inside `alias_dir`.
    pub fn resolve(&self, real: &Path, url: &str, alias_dir: &Path) -> PathBuf {
        if self.fits(real) {
            return real.to_path_buf();
        }

        let hash = url_hash(url);
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = tables.by_hash.get(&hash) {
            if entry.real == real {
                return entry.alias.clone();
            }
        }

        let filename = match real.extension() {
            Some(ext) => format!("{hash}.{}", ext.to_string_lossy()),
            None => hash.clone(),
        };
        let alias = alias_dir.join(filename);
        if !self.fits(&alias) {
            tracing::warn!(alias = %alias.display(), "alias path is still too long");
        }

        tracing::debug!(real = %real.display(), alias = %alias.display(), "aliased long path");
        tables.insert(AliasEntry {
            hash,
            url: url.to_string(),
            real: real.to_path_buf(),
            alias: alias.clone(),
        });
        alias
    }

    #[cfg(test)]
    pub fn alias_for(&self, real: &Path) -> Option<PathBuf> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let hash = tables.by_real.get(real)?;
        tables.by_hash.get(hash).map(|e| e.alias.clone())
    }

    pub fn real_for(&self, alias: &Path) -> Option<PathBuf> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let hash = tables.by_alias.get(alias)?;
        tables.by_hash.get(hash).map(|e| e.real.clone())
    }

    pub fn persist(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let mut entries: Vec<AliasEntry> = {
            let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
            tables.by_hash.values().cloned().collect()
        };
        entries.sort_by(|a, b| a.hash.cmp(&b.hash));

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, serde_json::to_string_pretty(&entries)?)
            .with_context(|| format!("writing alias table {}", file.display()))?;
        Ok(())
    }
}

pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_CHARS);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_path() -> PathBuf {
        let folder = "Tema muy largo con un nombre interminable ".repeat(4);
        PathBuf::from("/downloads/Algebra")
            .join(folder)
            .join("apuntes.pdf")
    }

    #[test]
    fn test_short_paths_are_untouched() {
        let registry = AliasRegistry::new(250);
        let real = Path::new("/downloads/Algebra/apuntes.pdf");

        let resolved = registry.resolve(real, "https://campus/a", Path::new("/downloads/Algebra"));
        assert_eq!(resolved, real);
        assert_eq!(registry.alias_for(real), None);
    }

    #[test]
    fn test_same_url_same_alias() {
        let registry = AliasRegistry::new(100);
        let real = long_path();
        let dir = Path::new("/downloads/Algebra");

        let first = registry.resolve(&real, "https://campus/pluginfile.php/1", dir);
        let second = registry.resolve(&real, "https://campus/pluginfile.php/1", dir);

        assert_eq!(first, second);
        assert_ne!(first, real);
        assert!(registry.fits(&first));
        assert_eq!(first.extension().unwrap(), "pdf");
    }

    #[test]
    fn test_both_directions_agree() {
        let registry = AliasRegistry::new(100);
        let real = long_path();

        let alias = registry.resolve(&real, "https://campus/x", Path::new("/downloads/Algebra"));

        assert_eq!(registry.alias_for(&real), Some(alias.clone()));
        assert_eq!(registry.real_for(&alias), Some(real));
    }

    #[test]
    fn test_different_urls_never_collide() {
        let registry = AliasRegistry::new(100);
        let dir = Path::new("/downloads/Algebra");
        let real_a = long_path().with_file_name("a.pdf");
        let real_b = long_path().with_file_name("b.pdf");

        let a = registry.resolve(&real_a, "https://campus/pluginfile.php/1", dir);
        let b = registry.resolve(&real_b, "https://campus/pluginfile.php/2", dir);

        assert_ne!(a, b);
        assert_eq!(url_hash("https://campus/1").len(), 32);
    }

    #[test]
    fn test_alias_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("aliases.json");
        let real = long_path();
        let alias_dir = Path::new("/downloads/Algebra");

        let registry = AliasRegistry::load(&file, 100).unwrap();
        let alias = registry.resolve(&real, "https://campus/keep", alias_dir);
        registry.persist().unwrap();

        let reloaded = AliasRegistry::load(&file, 100).unwrap();
        assert_eq!(reloaded.real_for(&alias), Some(real.clone()));
        assert_eq!(reloaded.resolve(&real, "https://campus/keep", alias_dir), alias);
    }

    #[test]
    fn test_long_component_does_not_fit() {
        let registry = AliasRegistry::new(10_000);
        let name = "x".repeat(NAME_MAX + 1);
        assert!(!registry.fits(&Path::new("/downloads").join(name)));
    }

    #[test]
    fn test_path_length_counts_characters() {
        let registry = AliasRegistry::new(250);
        // 200 characters but 400 bytes, every component under NAME_MAX
        let path = Path::new("/d")
            .join("á".repeat(100))
            .join(format!("{}.pdf", "é".repeat(90)));

        assert!(path.as_os_str().len() > 250);
        assert!(registry.fits(&path));

        let too_long = path.with_file_name(format!("{}.pdf", "é".repeat(150)));
        assert!(!registry.fits(&too_long));
    }
}
