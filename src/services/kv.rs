//! The persistent key-value contract the engine is written against, plus
//! the in-memory backend used by tests and provider-less runs.
//!
//! Alert, event, dedup, and journal state are all expressed purely in
//! terms of this contract; backends are swappable behind the trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<i64>) -> Result<(), StoreError>;

    /// Atomic insert-if-absent. Returns false when the key already held a
    /// live value. The dedup ledger is built on this single primitive.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<i64>,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Increments (creating at 0 if absent) and returns the new count.
    async fn increment_counter(&self, key: &str, ttl_secs: Option<i64>)
        -> Result<i64, StoreError>;

    /// Live (key, value) pairs whose key starts with `prefix`, sorted by key.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

#[derive(Debug, Default)]
struct MemEntry {
    value: Option<String>,
    counter: i64,
    expires_at: Option<i64>,
}

impl MemEntry {
    fn live(&self, now: i64) -> bool {
        match self.expires_at {
            Some(exp) => exp > now,
            None => true,
        }
    }
}

/// Mutex-guarded map backend. Expiry is lazy: dead entries are dropped
/// when a read or write touches them.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, MemEntry>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn expiry(ttl_secs: Option<i64>) -> Option<i64> {
        ttl_secs.map(|t| Self::now() + t)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.live(now) => Ok(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<i64>) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        entry.value = Some(value.to_string());
        entry.expires_at = Self::expiry(ttl_secs);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<i64>,
    ) -> Result<bool, StoreError> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            if existing.live(now) && existing.value.is_some() {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            MemEntry {
                value: Some(value.to_string()),
                counter: 0,
                expires_at: Self::expiry(ttl_secs),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(key) {
            Some(e) => Ok(e.live(now)),
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.live(now) => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn increment_counter(
        &self,
        key: &str,
        ttl_secs: Option<i64>,
    ) -> Result<i64, StoreError> {
        let now = Self::now();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_string()).or_default();
        if !entry.live(now) {
            entry.counter = 0;
            entry.value = None;
        }
        entry.counter += 1;
        entry.expires_at = Self::expiry(ttl_secs);
        Ok(entry.counter)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = Self::now();
        let entries = self.entries.lock().unwrap();
        let mut out: Vec<(String, String)> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.live(now))
            .filter_map(|(k, e)| e.value.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
