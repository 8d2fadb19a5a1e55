// src/store/item_store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::StoreError;

/// One stored value with its write metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
    /// Store-wide sequence number of the write that produced this value.
    pub revision: u64,
    pub created: DateTime<Utc>,
}

/// Keyed store with last-write-wins puts and per-key expiry.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Overwrite whatever is stored under `key`. Returns the new revision.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError>;

    /// `Ok(None)` when the key was never written or has expired.
    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError>;

    /// All live keys.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    revision: u64,
}

/// In-process item store. Entries older than `ttl` (measured from their last
/// write) are invisible and get dropped by [`MemoryItemStore::purge_expired`].
pub struct MemoryItemStore {
    inner: RwLock<Inner>,
    ttl: Option<chrono::Duration>,
    clock: Arc<dyn Clock>,
}

impl MemoryItemStore {
    pub fn new(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl: ttl.and_then(|d| chrono::Duration::from_std(d).ok()),
            clock,
        }
    }

    fn is_live(&self, e: &Entry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now < e.created + ttl,
            None => true,
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("item store lock poisoned".into())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| self.is_live(e, now));
        Ok(before - inner.entries.len())
    }

    /// Background sweep enforcing the TTL for entries nobody reads again.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match self.purge_expired() {
                    Ok(0) => {}
                    Ok(n) => {
                        counter!("hn_store_expired_total").increment(n as u64);
                        tracing::debug!(target: "store", removed = n, "expired items purged");
                    }
                    Err(e) => tracing::warn!(target: "store", error = %e, "ttl sweep failed"),
                }
            }
        })
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner.revision += 1;
        let revision = inner.revision;
        inner.entries.insert(
            key.to_string(),
            Entry {
                key: key.to_string(),
                value,
                revision,
                created: now,
            },
        );
        Ok(revision)
    }

    async fn get(&self, key: &str) -> Result<Option<Entry>, StoreError> {
        let now = self.clock.now();
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .entries
            .get(key)
            .filter(|e| self.is_live(e, now))
            .cloned())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner
            .entries
            .values()
            .filter(|e| self.is_live(e, now))
            .map(|e| e.key.clone())
            .collect())
    }
}
