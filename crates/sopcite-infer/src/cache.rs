//! LRU cache for query embeddings.
//!
//! Repeated questions (and evaluation runs over a gold set) skip the
//! embedder entirely. Default: 1000 entries, 1-hour TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache keyed by the exact query text.
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used at the front.
    order: VecDeque<String>,
    max_size: usize,
    ttl: Duration,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn evict(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

impl QueryCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: VecDeque::with_capacity(max_size),
                max_size: max_size.max(1),
                ttl,
            }),
        }
    }

    /// 1000 entries, 1 hour TTL.
    pub fn default_cache() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    /// Cached embedding for `query`, or None on a miss or expired entry.
    pub fn get(&self, query: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();

        let fresh = match inner.entries.get(query) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() < inner.ttl,
        };
        if !fresh {
            inner.evict(query);
            return None;
        }

        inner.touch(query);
        inner.entries.get(query).map(|e| e.embedding.clone())
    }

    pub fn put(&self, query: String, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            embedding,
            inserted_at: Instant::now(),
        };

        if inner.entries.contains_key(&query) {
            inner.touch(&query);
            inner.entries.insert(query, entry);
            return;
        }

        while inner.entries.len() >= inner.max_size {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.order.push_back(query.clone());
        inner.entries.insert(query, entry);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}
