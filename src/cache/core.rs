//! Content-addressed read-through cache with soft/hard byte limits, LRU
//! eviction, single-flight `put_async`, and a background evictor (§4.3).

use super::config::CacheConfig;
use super::key::CacheKey;
use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use super::store::BlockStore;
use crate::error::AgError;
use lru::LruCache;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct InflightEntry {
    done: Mutex<bool>,
    cv: Condvar,
}

struct Inner {
    store: Arc<dyn BlockStore>,
    order: Mutex<LruCache<CacheKey, u64>>,
    file_index: Mutex<HashMap<(u64, i64), HashSet<CacheKey>>>,
    used_bytes: AtomicU64,
    config: RwLock<CacheConfig>,
    metrics: CacheMetrics,
    inflight: Mutex<HashMap<CacheKey, Arc<InflightEntry>>>,
    evict_mutex: Mutex<()>,
    evict_cv: Condvar,
}

/// A handle to a detached, self-freeing `put_async` write (§4.3). Callers
/// need not hold onto it; `wait` is provided for tests that need
/// determinism.
#[derive(Clone)]
pub struct BlockFuture {
    entry: Arc<InflightEntry>,
}

impl BlockFuture {
    pub fn wait(&self) {
        let mut done = self.entry.done.lock();
        while !*done {
            self.entry.cv.wait(&mut done);
        }
    }
}

#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    pub fn new(store: Arc<dyn BlockStore>, config: CacheConfig) -> Self {
        let inner = Arc::new(Inner {
            store,
            order: Mutex::new(LruCache::unbounded()),
            file_index: Mutex::new(HashMap::new()),
            used_bytes: AtomicU64::new(0),
            config: RwLock::new(config),
            metrics: CacheMetrics::default(),
            inflight: Mutex::new(HashMap::new()),
            evict_mutex: Mutex::new(()),
            evict_cv: Condvar::new(),
        });

        let bg = inner.clone();
        std::thread::spawn(move || loop {
            {
                let mut guard = bg.evict_mutex.lock();
                bg.evict_cv.wait_for(&mut guard, Duration::from_millis(200));
            }
            evict_to_soft(&bg);
        });

        Cache { inner }
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn config(&self) -> CacheConfig {
        self.inner.config.read().clone()
    }

    /// Read-through get: hit touches LRU recency and returns the bytes; a
    /// miss returns `None`. Entries larger than the volume block size are
    /// discarded on read as a size sanity check (§4.3) — such an entry
    /// should never have been written, and treating it as a miss forces a
    /// re-fetch rather than serving possibly-truncated data.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if let Some(bytes) = self.inner.store.get(key) {
            let max = self.inner.config.read().block_size_bytes.saturating_mul(2).max(1 << 20);
            if bytes.len() as u64 > max {
                self.evict(key);
                self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            self.promote(key);
            self.inner.metrics.hits.fetch_add(1, Ordering::Relaxed);
            return Some(bytes);
        }
        self.inner.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// LRU touch without reading the payload.
    pub fn promote(&self, key: &CacheKey) {
        self.inner.order.lock().promote(key);
    }

    /// Starts a detached write. Concurrent `put_async` calls for the same
    /// key coalesce: only the first proceeds, the rest observe
    /// [`AgError::Cache`] carrying `"EEXIST"` and should free their own
    /// copy of `bytes` (§4.3, §8 single-flight law).
    pub fn put_async(&self, key: CacheKey, bytes: Vec<u8>) -> Result<BlockFuture, AgError> {
        let entry = {
            let mut inflight = self.inner.inflight.lock();
            if inflight.contains_key(&key) {
                self.inner.metrics.put_coalesced.fetch_add(1, Ordering::Relaxed);
                return Err(AgError::Cache("EEXIST".to_string()));
            }
            let entry = Arc::new(InflightEntry { done: Mutex::new(false), cv: Condvar::new() });
            inflight.insert(key, entry.clone());
            entry
        };

        let inner = self.inner.clone();
        let fut_entry = entry.clone();
        std::thread::spawn(move || {
            wait_for_room(&inner, bytes.len() as u64);

            let size = bytes.len() as u64;
            inner.store.put(&key, bytes);
            let prev = inner.order.lock().put(key, size);
            if let Some(prev_size) = prev {
                inner.used_bytes.fetch_sub(prev_size, Ordering::AcqRel);
            }
            inner.used_bytes.fetch_add(size, Ordering::AcqRel);
            inner
                .file_index
                .lock()
                .entry(key.file_key())
                .or_default()
                .insert(key);
            inner.metrics.puts.fetch_add(1, Ordering::Relaxed);
            inner.metrics.bytes_used.store(inner.used_bytes.load(Ordering::Acquire), Ordering::Relaxed);

            inner.inflight.lock().remove(&key);
            {
                let mut done = fut_entry.done.lock();
                *done = true;
            }
            fut_entry.cv.notify_all();
            inner.evict_cv.notify_one();
        });

        Ok(BlockFuture { entry })
    }

    /// Removes a single entry.
    pub fn evict(&self, key: &CacheKey) {
        self.inner.store.remove(key);
        if let Some(size) = self.inner.order.lock().pop(key) {
            self.inner.used_bytes.fetch_sub(size, Ordering::AcqRel);
            self.inner.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(set) = self.inner.file_index.lock().get_mut(&key.file_key()) {
            set.remove(key);
        }
    }

    /// Removes every block and manifest for `(file_id, file_version)`;
    /// used on reversion (§4.3, §4.7).
    pub fn evict_file(&self, file_id: u64, file_version: i64) {
        let keys: Vec<CacheKey> = self
            .inner
            .file_index
            .lock()
            .remove(&(file_id, file_version))
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for key in keys {
            self.inner.store.remove(&key);
            if let Some(size) = self.inner.order.lock().pop(&key) {
                self.inner.used_bytes.fetch_sub(size, Ordering::AcqRel);
                self.inner.metrics.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn used_bytes(&self) -> u64 {
        self.inner.used_bytes.load(Ordering::Acquire)
    }
}

fn wait_for_room(inner: &Inner, incoming: u64) {
    let hard = inner.config.read().hard_limit_bytes;
    loop {
        if inner.used_bytes.load(Ordering::Acquire).saturating_add(incoming) <= hard {
            return;
        }
        inner.evict_cv.notify_one();
        evict_to_soft(inner);
        if inner.used_bytes.load(Ordering::Acquire).saturating_add(incoming) <= hard {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn evict_to_soft(inner: &Inner) {
    let soft = inner.config.read().soft_limit_bytes;
    loop {
        if inner.used_bytes.load(Ordering::Acquire) <= soft {
            return;
        }
        let popped = inner.order.lock().pop_lru();
        match popped {
            Some((key, size)) => {
                inner.store.remove(&key);
                inner.used_bytes.fetch_sub(size, Ordering::AcqRel);
                inner.metrics.evictions.fetch_add(1, Ordering::Relaxed);
                if let Some(set) = inner.file_index.lock().get_mut(&key.file_key()) {
                    set.remove(&key);
                }
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;

    fn cache(soft: u64, hard: u64) -> Cache {
        Cache::new(
            Arc::new(MemoryStore::new()),
            CacheConfig { soft_limit_bytes: soft, hard_limit_bytes: hard, block_size_bytes: 1024 },
        )
    }

    #[test]
    fn miss_then_hit() {
        let c = cache(1 << 20, 1 << 21);
        let key = CacheKey::block(1, 1, 0, 1);
        assert!(c.get(&key).is_none());
        c.put_async(key, vec![1, 2, 3]).unwrap().wait();
        assert_eq!(c.get(&key), Some(vec![1, 2, 3]));
    }

    #[test]
    fn single_flight_coalesces() {
        let c = cache(1 << 20, 1 << 21);
        let key = CacheKey::block(1, 1, 0, 1);
        let f1 = c.put_async(key, vec![1]).unwrap();
        let second = c.put_async(key, vec![2]);
        assert!(second.is_err());
        f1.wait();
    }

    #[test]
    fn evict_file_drops_all_its_keys() {
        let c = cache(1 << 20, 1 << 21);
        let b0 = CacheKey::block(1, 1, 0, 1);
        let b1 = CacheKey::block(1, 1, 1, 1);
        let m = CacheKey::manifest(1, 1, 100, 0);
        c.put_async(b0, vec![1]).unwrap().wait();
        c.put_async(b1, vec![2]).unwrap().wait();
        c.put_async(m, vec![3]).unwrap().wait();
        c.evict_file(1, 1);
        assert!(c.get(&b0).is_none());
        assert!(c.get(&b1).is_none());
        assert!(c.get(&m).is_none());
    }

    #[test]
    fn soft_limit_evicts_lru() {
        let c = cache(10, 1 << 20);
        let k1 = CacheKey::block(1, 1, 0, 1);
        let k2 = CacheKey::block(1, 1, 1, 1);
        c.put_async(k1, vec![0u8; 8]).unwrap().wait();
        c.put_async(k2, vec![0u8; 8]).unwrap().wait();
        std::thread::sleep(Duration::from_millis(400));
        // k1 is least-recently-used and should have been evicted to get
        // back under the 10-byte soft limit.
        assert!(c.get(&k1).is_none());
        assert!(c.get(&k2).is_some());
    }
}
