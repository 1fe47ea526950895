//! Gateway certificate cache (§11.4). A narrow external collaborator in
//! the original system (the MS issues certificates); here it is a trait
//! plus an in-memory LRU-backed implementation so the signed-chunk codec
//! and the POST envelope handler have somewhere to look up a signing
//! gateway's public key.

use lru::LruCache;
use p256::ecdsa::VerifyingKey;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

pub trait CertStore: Send + Sync {
    /// Looks up a gateway's public key. `None` means "not yet known" —
    /// callers should surface [`crate::error::AgError::CertUnknown`] and
    /// kick the MS reloader (§4.4, §4.9).
    fn public_key(&self, gateway_id: u64) -> Option<VerifyingKey>;

    fn install(&self, gateway_id: u64, key: VerifyingKey);
}

pub struct InMemoryCertStore {
    keys: Mutex<LruCache<u64, VerifyingKey>>,
}

impl InMemoryCertStore {
    pub fn new(capacity: usize) -> Self {
        InMemoryCertStore {
            keys: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
        }
    }
}

impl CertStore for InMemoryCertStore {
    fn public_key(&self, gateway_id: u64) -> Option<VerifyingKey> {
        self.keys.lock().get(&gateway_id).cloned()
    }

    fn install(&self, gateway_id: u64, key: VerifyingKey) {
        self.keys.lock().put(gateway_id, key);
    }
}
