//! Read-through caching for balances, transactions and accounts.
//!
//! Writers never populate the cache. They call [`CoherentCache::invalidate`]
//! after a durable commit, and the next read repopulates it from storage.

mod memory;

pub use memory::InMemoryCache;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::{AccountId, TransactionId};

pub const BALANCE_TTL: Duration = Duration::from_secs(15 * 60);
pub const TRANSACTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const ACCOUNT_TTL: Duration = Duration::from_secs(60 * 60);

pub fn balance_key(account_id: AccountId) -> String {
    format!("balance:account:{}", account_id)
}

pub fn transaction_key(id: TransactionId) -> String {
    format!("transaction:{}", id)
}

pub fn account_key(account_id: AccountId) -> String {
    format!("account:{}", account_id)
}

/// A byte cache with per-entry expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read-through front for a [`Cache`] that cannot resurrect invalidated data.
///
/// While a load for a key is in flight the key carries an invalidation
/// generation. A reader notes the generation before going to storage and only
/// keeps what it stored in the cache if no invalidation ran in between. Keys
/// are tracked only while some reader is loading them. Cache failures are
/// logged and never fail a read.
pub struct CoherentCache {
    cache: Arc<dyn Cache>,
    generations: DashMap<String, Tracked>,
}

#[derive(Default)]
struct Tracked {
    generation: u64,
    readers: usize,
}

/// A reader's registration on a key. Dropping it untracks the key once no
/// other reader is loading it.
struct InFlight<'a> {
    generations: &'a DashMap<String, Tracked>,
    key: &'a str,
    generation: u64,
}

impl<'a> InFlight<'a> {
    fn begin(generations: &'a DashMap<String, Tracked>, key: &'a str) -> Self {
        let generation = {
            let mut tracked = generations.entry(key.to_string()).or_default();
            tracked.readers += 1;
            tracked.generation
        };
        Self {
            generations,
            key,
            generation,
        }
    }

    fn is_current(&self) -> bool {
        self.generations
            .get(self.key)
            .is_some_and(|tracked| tracked.generation == self.generation)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mut tracked) = self.generations.get_mut(self.key) {
            tracked.readers = tracked.readers.saturating_sub(1);
        }
        self.generations
            .remove_if(self.key, |_, tracked| tracked.readers == 0);
    }
}

impl CoherentCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            generations: DashMap::new(),
        }
    }

    /// Serve `key` from the cache, or from `load` on a miss.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => debug!(key, error = %e, "discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "cache read failed, falling back to storage"),
        }

        let in_flight = InFlight::begin(&self.generations, key);
        let loaded = load().await?;

        if let Some(value) = &loaded {
            self.populate(key, value, ttl, &in_flight).await;
        }
        Ok(loaded)
    }

    async fn populate<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        in_flight: &InFlight<'_>,
    ) {
        if !in_flight.is_current() {
            debug!(key, "skipping cache fill, entry was invalidated during the read");
            return;
        }

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, bytes, ttl).await {
            warn!(key, error = %e, "cache write failed");
            return;
        }

        // An invalidation may have slipped in between the check and the write.
        if !in_flight.is_current() {
            self.delete(key).await;
        }
    }

    /// Drop the cached entry for `key`. Called after every durable commit.
    pub async fn invalidate(&self, key: &str) {
        if let Some(mut tracked) = self.generations.get_mut(key) {
            tracked.generation += 1;
        }
        self.delete(key).await;
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key, error = %e, "cache delete failed");
        }
    }
}
