use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use picks_core::Criteria;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::StoreError;

/// TTL key-value cache holding serialized JSON
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn KeyValueCache,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl).await
}

/// `picks:<sha256 of the criteria JSON>`
pub fn criteria_cache_key(criteria: &Criteria) -> String {
    // Field order is fixed by the struct, so the encoding is stable.
    let encoded = serde_json::to_vec(criteria).unwrap_or_default();
    format!("picks:{}", hex::encode(Sha256::digest(&encoded)))
}

struct CacheEntry {
    data: String,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now - self.cached_at < ttl,
            Err(_) => true,
        }
    }
}

/// Expired entries are swept once every this many writes
const SWEEP_EVERY: usize = 64;

/// Process-local cache used when Redis is not configured
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(now) {
                return Ok(Some(entry.data.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            let removed = self.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Swept expired cache entries");
            }
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_string(),
                cached_at: Utc::now(),
                ttl,
            },
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
