//! In-process memo of read responses, backed by DashMap so a single instance
//! can be shared behind an `Arc` by every caller in the session.
//!
//! Staleness is checked lazily on read. Entries are never evicted; an expired
//! entry stays in the map until the same key is written again.

use crate::clock::{Clock, SystemClock};
use crm_core::config::CacheConfig;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at_millis: u64,
}

pub struct RequestCache<V> {
    store: DashMap<String, CacheEntry<V>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(ttl_ms: u64) -> Self {
        Self::with_clock(ttl_ms, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: DashMap::new(),
            ttl_ms,
            clock,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.effective_ttl_ms())
    }

    /// Returns the value stored under `key` if it is younger than the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        let fresh = self
            .store
            .get(key)
            .filter(|entry| now.saturating_sub(entry.stored_at_millis) < self.ttl_ms)
            .map(|entry| entry.value.clone());

        if fresh.is_some() {
            metrics::counter!("crm.cache.hit").increment(1);
            debug!(key = key, "Request cache hit");
        } else {
            metrics::counter!("crm.cache.miss").increment(1);
            debug!(key = key, "Request cache miss");
        }
        fresh
    }

    /// Stores `value` stamped with the current time, replacing any prior entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            value,
            stored_at_millis: self.clock.now_millis(),
        };
        self.store.insert(key, entry);
    }

    /// Raw entry regardless of age.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
