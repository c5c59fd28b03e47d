//! Response caching.
//!
//! Entries are stored fully buffered and expire after a per-entry TTL.
//! Expired entries are dropped lazily when read; there is no background sweep.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::time::Instant;

use crate::data::{Body, Response};
use crate::error::CacheError;

/// Store for completed responses.
///
/// Implementations must hand out responses that callers can consume or
/// mutate freely without affecting what is stored.
pub trait Cache: Send + Sync {
    /// Look up a stored response.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key, by default the request's absolute URL
    ///
    /// # Returns
    ///
    /// `Some(response)` with an independent, fully buffered copy if an entry
    /// for `key` exists and has not expired, `None` otherwise. Lookups never
    /// fail; a store that cannot be read reports a miss.
    fn get(&self, key: &str) -> impl Future<Output = Option<Response>> + Send;

    /// Store `response` under `key` for `ttl`.
    ///
    /// Reads the body once and leaves `response` holding a replayable copy,
    /// so the caller can still consume it as if it had not been cached.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `response` - The response to store; its body is replaced by the buffered copy
    /// * `ttl` - How long the entry stays fresh
    ///
    /// # Returns
    ///
    /// `Ok(())` once the entry is stored, replacing any previous entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the body cannot be read or the store rejects
    /// the write. The client logs these and still returns the response.
    fn set_ttl(
        &self,
        key: &str,
        response: &mut Response,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

impl<C: Cache> Cache for Arc<C> {
    fn get(&self, key: &str) -> impl Future<Output = Option<Response>> + Send { (**self).get(key) }

    fn set_ttl(
        &self,
        key: &str,
        response: &mut Response,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        (**self).set_ttl(key, response, ttl)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    expiry:  Instant,
    status:  StatusCode,
    headers: HeaderMap,
    body:    Bytes,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool { now < self.expiry }

    fn to_response(&self) -> Response {
        Response {
            status:  self.status,
            headers: self.headers.clone(),
            body:    Body::from(self.body.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries:   usize,
    pub fresh_entries:   usize,
    pub expired_entries: usize,
    pub max_entries:     Option<usize>,
}

/// In-process cache shared by every clone of it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries:     Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: Option<usize>,
}

impl InMemoryCache {
    pub fn new() -> Self { Self::default() }

    /// Bound the number of entries. When full, expired entries are purged
    /// first, then the entry closest to expiry is evicted.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries:     Arc::default(),
            max_entries: Some(max_entries.max(1)),
        }
    }

    pub fn len(&self) -> usize { self.read().len() }

    pub fn is_empty(&self) -> bool { self.read().is_empty() }

    pub fn remove(&self, key: &str) -> bool { self.write().remove(key).is_some() }

    pub fn clear(&self) { self.write().clear() }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.read();
        let fresh_entries = entries.values().filter(|e| e.is_fresh(now)).count();
        CacheStats {
            total_entries: entries.len(),
            fresh_entries,
            expired_entries: entries.len() - fresh_entries,
            max_entries: self.max_entries,
        }
    }

    fn lookup(&self, key: &str) -> Option<Response> {
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_fresh(now) => return Some(entry.to_response()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a writer may have refreshed the key.
        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| !entry.is_fresh(now)) {
            entries.remove(key);
        }
        None
    }

    fn insert(&self, key: &str, entry: CacheEntry) {
        let mut entries = self.write();
        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(key) {
                let now = Instant::now();
                entries.retain(|_, e| e.is_fresh(now));
                if entries.len() >= max {
                    evict_soonest(&mut entries);
                }
            }
        }
        entries.insert(key.to_string(), entry);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_soonest(entries: &mut HashMap<String, CacheEntry>) {
    let soonest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expiry)
        .map(|(key, _)| key.clone());

    if let Some(key) = soonest {
        entries.remove(&key);
    }
}

/// Far enough out to never matter, without overflowing `Instant`.
fn expiry_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Response> { self.lookup(key) }

    async fn set_ttl(&self, key: &str, response: &mut Response, ttl: Duration) -> Result<(), CacheError> {
        let body = response.body.buffer().await.map_err(CacheError::Body)?;
        self.insert(key, CacheEntry {
            expiry: expiry_after(ttl),
            status: response.status,
            headers: response.headers.clone(),
            body,
        });
        Ok(())
    }
}
