//! Process-local cache backed by a concurrent map

use chrono::Utc;
use dashmap::DashMap;

use super::{filter_matches, CacheEntry, CacheFilter, CacheSetOptions, CacheStore};
use crate::errors::Result;

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = Utc::now();
        // Evicts only if still expired under the shard lock, so a fresh `set` survives
        if self.entries.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(key)
            .map(|e| e.value().clone())
            .filter(|e| !e.is_expired(now)))
    }

    fn set(&self, key: &str, value: &str, options: CacheSetOptions) -> Result<CacheEntry> {
        let entry = CacheEntry::new(key, value, options, Utc::now());
        self.entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn clear(&self, filter: Option<&CacheFilter>) -> Result<usize> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| filter_matches(filter, e.key()))
            .map(|e| e.key().clone())
            .collect();
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }

    fn get_all(&self, filter: Option<&CacheFilter>) -> Result<Vec<CacheEntry>> {
        self.cleanup()?;
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .filter(|e| filter_matches(filter, e.key()))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    fn cleanup(&self) -> Result<usize> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheFilter;
    use std::time::Duration;

    #[test]
    fn test_set_get_delete() {
        let store = MemoryCacheStore::new();
        store.set("a", "1", CacheSetOptions::default()).unwrap();

        assert_eq!(store.get("a").unwrap().map(|e| e.value), Some("1".to_string()));
        assert!(store.has("a").unwrap());
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(!store.has("a").unwrap());
    }

    #[test]
    fn test_expired_entries_are_absent_and_evicted() {
        let store = MemoryCacheStore::new();
        let past = Utc::now() - chrono::Duration::seconds(1);
        store
            .set(
                "old",
                "x",
                CacheSetOptions {
                    expires_at: Some(past),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set("fresh", "y", CacheSetOptions::with_ttl(Duration::from_secs(60)))
            .unwrap();

        assert!(store.get("old").unwrap().is_none());
        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.size().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_reader_never_evicts_fresh_value() {
        let store = MemoryCacheStore::new();
        let expired = || CacheSetOptions {
            expires_at: Some(Utc::now() - chrono::Duration::seconds(1)),
            ..Default::default()
        };

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                for _ in 0..2000 {
                    let _ = store.get("k").unwrap();
                }
            });
            for i in 0..2000 {
                store.set("k", "stale", expired()).unwrap();
                store.set("k", &i.to_string(), CacheSetOptions::default()).unwrap();
                assert!(store.get("k").unwrap().is_some(), "fresh value evicted at {}", i);
            }
            reader.join().unwrap();
        });
    }

    #[test]
    fn test_cleanup_and_clear_by_prefix() {
        let store = MemoryCacheStore::new();
        let past = Utc::now() - chrono::Duration::seconds(1);
        store
            .set("response:a", "1", CacheSetOptions { expires_at: Some(past), ..Default::default() })
            .unwrap();
        store.set("response:b", "2", CacheSetOptions::default()).unwrap();
        store.set("prompt:c", "3", CacheSetOptions::default()).unwrap();

        assert_eq!(store.cleanup().unwrap(), 1);
        assert_eq!(store.clear(Some(&CacheFilter::prefix("response:"))).unwrap(), 1);
        assert_eq!(store.get_all(None).unwrap().len(), 1);
        assert_eq!(store.clear(None).unwrap(), 1);
    }
}
