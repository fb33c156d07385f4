//! JSON-file cache
//!
//! Same persistence scheme as the cookie file: whole-document
//! read-modify-write under a lock, atomic replace on save.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{filter_matches, CacheEntry, CacheFilter, CacheSetOptions, CacheStore};
use crate::errors::{ReqchainError, Result};
use crate::utils::{read_if_exists, write_atomic};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    entries: IndexMap<String, CacheEntry>,
}

impl CacheDocument {
    fn evict_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on the loaded document; save when it reports a change
    fn transact<R>(&self, f: impl FnOnce(&mut CacheDocument) -> (R, bool)) -> Result<R> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ReqchainError::Cache("cache file lock poisoned".to_string()))?;
        let mut doc = self.load()?;
        let (out, modified) = f(&mut doc);
        if modified {
            let content = serde_json::to_vec_pretty(&doc)?;
            write_atomic(&self.path, &content)
                .map_err(|e| ReqchainError::Cache(format!("Failed to save cache: {}", e)))?;
        }
        Ok(out)
    }

    fn load(&self) -> Result<CacheDocument> {
        let Some(content) = read_if_exists(&self.path)? else {
            return Ok(CacheDocument::default());
        };
        if content.trim().is_empty() {
            return Ok(CacheDocument::default());
        }
        match serde_json::from_str(&content) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file is corrupt, starting empty");
                Ok(CacheDocument::default())
            }
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.transact(|doc| {
            let Some(entry) = doc.entries.get(key).cloned() else {
                return (None, false);
            };
            if entry.is_expired(Utc::now()) {
                doc.entries.shift_remove(key);
                (None, true)
            } else {
                (Some(entry), false)
            }
        })
    }

    fn set(&self, key: &str, value: &str, options: CacheSetOptions) -> Result<CacheEntry> {
        let entry = CacheEntry::new(key, value, options, Utc::now());
        self.transact(|doc| {
            doc.entries.shift_remove(key);
            doc.entries.insert(key.to_string(), entry.clone());
            (entry, true)
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.transact(|doc| {
            let removed = doc.entries.shift_remove(key).is_some();
            (removed, removed)
        })
    }

    fn clear(&self, filter: Option<&CacheFilter>) -> Result<usize> {
        self.transact(|doc| {
            let before = doc.entries.len();
            doc.entries.retain(|key, _| !filter_matches(filter, key));
            let removed = before - doc.entries.len();
            (removed, removed > 0)
        })
    }

    fn get_all(&self, filter: Option<&CacheFilter>) -> Result<Vec<CacheEntry>> {
        self.transact(|doc| {
            let evicted = doc.evict_expired();
            let entries = doc
                .entries
                .values()
                .filter(|e| filter_matches(filter, &e.key))
                .cloned()
                .collect();
            (entries, evicted > 0)
        })
    }

    fn cleanup(&self) -> Result<usize> {
        self.transact(|doc| {
            let evicted = doc.evict_expired();
            (evicted, evicted > 0)
        })
    }
}
