//! TTL store implementation.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::clock::{self, Clock};
use crate::lifecycle::sweeper::Sweep;

/// A stored value with its expiry deadline.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when `now + ttl` is past the range of `Instant`: never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// Point-in-time snapshot of the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entries physically present, live or not.
    pub total: usize,
    /// Entries still visible to readers.
    pub active: usize,
    /// Entries past expiry that the sweep has not reclaimed yet.
    pub expired: usize,
    pub ttl_seconds: f64,
}

/// Thread-safe key-value store where every write lives for a fixed TTL.
///
/// Expired entries are invisible to all read operations immediately, and are
/// physically removed by [`ExpiringStore::sweep`], normally driven by a
/// background sweeper.
#[derive(Debug)]
pub struct ExpiringStore<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ExpiringStore<V> {
    /// Create a store using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, clock::system())
    }

    /// Create a store reading time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// The TTL applied to every write.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace `key`, resetting its expiry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let expires_at = self.clock.now().checked_add(self.ttl);
        self.write().insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Get the value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// All unexpired values, in no particular order.
    pub fn get_all(&self) -> Vec<V> {
        let now = self.clock.now();
        self.read()
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Remove `key`. Returns true if an entry (live or stale) was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn exists(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.read().get(key).is_some_and(|entry| entry.is_live(now))
    }

    /// Number of unexpired entries.
    pub fn count(&self) -> usize {
        let now = self.clock.now();
        self.read().values().filter(|entry| entry.is_live(now)).count()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.read();
        let active = entries.values().filter(|entry| entry.is_live(now)).count();
        CacheStats {
            total: entries.len(),
            active,
            expired: entries.len() - active,
            ttl_seconds: self.ttl.as_secs_f64(),
        }
    }

    /// Physically remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    // A panic in another lock holder must not wedge the cache, so poisoning
    // is recovered instead of propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send + Sync> Sweep for ExpiringStore<V> {
    fn sweep(&self) -> usize {
        ExpiringStore::sweep(self)
    }

    fn tracked(&self) -> usize {
        self.read().len()
    }
}
