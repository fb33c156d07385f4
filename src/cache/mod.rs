//! Key/value cache with per-entry TTL
//!
//! Backs chained response values (`response:` keys) and remembered prompt
//! answers (`prompt:` keys). Every read path treats an expired entry as
//! absent and evicts it.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::Result;

/// A cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub id: String,
    pub key: String,
    /// Stored in its string serialization
    pub value: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

impl CacheEntry {
    pub fn new(key: &str, value: &str, options: CacheSetOptions, now: DateTime<Utc>) -> Self {
        let expires_at = options.expires_at.or_else(|| {
            options
                .ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| now + ttl)
        });
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            value: value.to_string(),
            created_at: now,
            expires_at,
            metadata: options.metadata,
        }
    }

    /// Expired once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Options for [`CacheStore::set`]; `expires_at` wins over `ttl`
#[derive(Debug, Clone, Default)]
pub struct CacheSetOptions {
    pub ttl: Option<Duration>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: Option<JsonValue>,
}

impl CacheSetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }
}

/// Selects entries by key prefix and/or key pattern
#[derive(Debug, Clone, Default)]
pub struct CacheFilter {
    pub prefix: Option<String>,
    pub pattern: Option<Regex>,
}

impl CacheFilter {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            pattern: None,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        self.prefix.as_deref().map_or(true, |p| key.starts_with(p))
            && self.pattern.as_ref().map_or(true, |re| re.is_match(key))
    }
}

fn filter_matches(filter: Option<&CacheFilter>, key: &str) -> bool {
    filter.map_or(true, |f| f.matches(key))
}

/// Pluggable cache storage
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    fn set(&self, key: &str, value: &str, options: CacheSetOptions) -> Result<CacheEntry>;

    fn delete(&self, key: &str) -> Result<bool>;

    /// Remove matching entries (all when `filter` is `None`)
    fn clear(&self, filter: Option<&CacheFilter>) -> Result<usize>;

    /// Live entries matching `filter`, in insertion order where the backend keeps one
    fn get_all(&self, filter: Option<&CacheFilter>) -> Result<Vec<CacheEntry>>;

    /// Purge expired entries
    fn cleanup(&self) -> Result<usize>;

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn size(&self) -> Result<usize> {
        Ok(self.get_all(None)?.len())
    }
}
