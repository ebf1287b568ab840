// src/core/replication/dedup.rs

//! A bounded memo of recently applied replicated operations.
//!
//! Retried and re-forwarded replication calls deliver the same message more
//! than once; the guard lets the callee answer `AlreadyProcessed` instead of
//! appending a duplicate. The LRU bound keeps it from growing with traffic;
//! the capacity is far larger than any retry window.

use crate::core::cluster::ResourceKind;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt;
use std::num::NonZeroUsize;

const DEFAULT_CAPACITY: usize = 65_536;

pub struct ReplayGuard {
    seen: Mutex<LruCache<u128, ()>>,
}

impl fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayGuard")
            .field("len", &self.seen.lock().len())
            .finish()
    }
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Whether this operation was already applied. Does not record it.
    pub fn seen(&self, kind: ResourceKind, name: &str, sender: &str, content: &str) -> bool {
        let key = digest(kind, name, sender, content);
        self.seen.lock().contains(&key)
    }

    /// Records an applied operation, evicting the least recent entry at
    /// capacity.
    pub fn record(&self, kind: ResourceKind, name: &str, sender: &str, content: &str) {
        let key = digest(kind, name, sender, content);
        self.seen.lock().put(key, ());
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// 128-bit digest over the operation fields. Fields are length-prefixed so
/// concatenation cannot collide across field boundaries.
fn digest(kind: ResourceKind, name: &str, sender: &str, content: &str) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update([match kind {
        ResourceKind::Topic => 0u8,
        ResourceKind::Queue => 1u8,
    }]);
    for field in [name, sender, content] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(prefix)
}
