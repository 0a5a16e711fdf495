//! [`KeyValueStore`] adapters.
//!
//! `FileStore` keeps every key as a string in a small TOML table:
//!
//! ```toml
//! whitelist = "aa:bb:cc:dd:ee:01,aa:bb:cc:dd:ee:02"
//! ```
//!
//! Each `set` rewrites the whole file through a temporary sibling and a
//! rename, so a crash mid-write leaves the previous contents intact.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::whitelist::{KeyValueStore, StoreError};

/// TOML-file-backed store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for read errors other than "not found" and
    /// [`StoreError::Corrupt`] if the file is not a flat string table.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content =
            toml::to_string(&self.entries).map_err(|e| StoreError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "store flushed");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

/// Volatile store for tests and `--ephemeral` runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::whitelist::{Whitelist, WHITELIST_KEY};
    use keyless_core::PeerIdentity;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("keyless_store_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = temp_dir();
        let store = FileStore::open(dir.join("whitelist.toml")).unwrap();
        assert_eq!(store.get(WHITELIST_KEY).unwrap(), None);
        assert!(!dir.exists(), "opening must not create the file");
    }

    #[test]
    fn test_set_persists_across_reopen() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("whitelist.toml");
        let mut store = FileStore::open(&path).unwrap();

        // Act
        store.set(WHITELIST_KEY, "key-1,key-2").unwrap();
        let reopened = FileStore::open(&path).unwrap();

        // Assert
        assert_eq!(
            reopened.get(WHITELIST_KEY).unwrap(),
            Some("key-1,key-2".to_string())
        );
        assert!(!path.with_extension("toml.tmp").exists());

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("whitelist.toml");
        std::fs::write(&path, "whitelist = [1, 2").unwrap();

        let result = FileStore::open(&path);

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_whitelist_survives_restart_with_file_store() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("whitelist.toml");
        let mut whitelist = Whitelist::load(Box::new(FileStore::open(&path).unwrap())).unwrap();

        // Act
        whitelist.admit(&PeerIdentity::new("aa:bb:cc:dd:ee:01")).unwrap();
        drop(whitelist);
        let reloaded = Whitelist::load(Box::new(FileStore::open(&path).unwrap())).unwrap();

        // Assert
        assert!(reloaded.contains(&PeerIdentity::new("aa:bb:cc:dd:ee:01")));
        assert_eq!(reloaded.len(), 1);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.get("other").unwrap(), None);
    }
}
