//! In-memory cache of platform messages spawned per source message.
//!
//! Keyed `(source message id, cache key)`. Entries older than the staleness
//! window are swept on every insert so abandoned conversations cannot grow
//! the map without bound. Rebuilt empty on restart.

use crate::reconcile::MessageHandle;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// One cached platform message.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub handle: MessageHandle,
    pub last_used: DateTime<Utc>,
}

/// Cache of sent messages, owned exclusively by the reconciler.
#[derive(Debug)]
pub struct MessageCache {
    ttl: Duration,
    map: HashMap<String, HashMap<String, CacheEntry>>,
}

impl MessageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            map: HashMap::new(),
        }
    }

    /// Insert or replace the entry for `(source_id, key)` and sweep stale
    /// entries.
    pub fn insert(&mut self, source_id: &str, key: &str, handle: MessageHandle) {
        self.insert_at(source_id, key, handle, Utc::now());
    }

    pub fn get(&self, source_id: &str, key: &str) -> Option<&CacheEntry> {
        self.map.get(source_id).and_then(|entries| entries.get(key))
    }

    /// All cached keys for one source message.
    pub fn keys(&self, source_id: &str) -> Vec<String> {
        self.map
            .get(source_id)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, source_id: &str, key: &str) -> Option<CacheEntry> {
        let entries = self.map.get_mut(source_id)?;
        let removed = entries.remove(key);
        if entries.is_empty() {
            self.map.remove(source_id);
        }
        removed
    }

    /// Number of cached entries for one source message.
    pub fn len(&self, source_id: &str) -> usize {
        self.map.get(source_id).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop entries unused for longer than the staleness window.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.map.retain(|_, entries| {
            entries.retain(|_, entry| now - entry.last_used <= ttl);
            !entries.is_empty()
        });
    }

    fn insert_at(&mut self, source_id: &str, key: &str, handle: MessageHandle, now: DateTime<Utc>) {
        self.map.entry(source_id.to_string()).or_default().insert(
            key.to_string(),
            CacheEntry {
                handle,
                last_used: now,
            },
        );
        self.sweep(now);
    }
}
