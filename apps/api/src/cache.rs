//! Bounded TTL cache shared by concurrent requests.
//!
//! Expiry is checked on read; nothing sweeps in the background, so an expired entry
//! that is never read again stays until capacity pressure evicts it. Eviction is
//! FIFO by insertion order (the oldest inserted key goes first), not LRU.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order. Keys removed on read leave stale `(key, seq)` pairs behind,
    /// which eviction skips.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses), 0 when the cache has never been read.
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            ttl,
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit: {}", short_key(key));
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            tracing::debug!("Cache miss (TTL expired): {}", short_key(key));
        } else {
            tracing::debug!("Cache miss: {}", short_key(key));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Inserts or refreshes `key`. A refreshed key keeps its place in eviction order.
    pub fn put(&self, key: String, value: V) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.inserted_at = now;
            return;
        }

        while inner.entries.len() >= self.max_size {
            let Some((oldest, seq)) = inner.order.pop_front() else {
                break;
            };
            let live = inner.entries.get(&oldest).is_some_and(|e| e.seq == seq);
            if live {
                inner.entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache evicted oldest entry: {}", short_key(&oldest));
            }
        }

        if inner.order.len() > self.max_size * 2 {
            let Inner { entries, order, .. } = &mut *inner;
            order.retain(|(k, s)| entries.get(k).is_some_and(|e| e.seq == *s));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((key.clone(), seq));
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                seq,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: self.len(),
            max_size: self.max_size,
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Hex SHA-256 over the parts, separated so ("ab", "c") and ("a", "bc") differ.
pub fn content_key(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    format!("{prefix}{}", hex::encode(hasher.finalize()))
}

fn short_key(key: &str) -> &str {
    match key.char_indices().nth(24) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}
