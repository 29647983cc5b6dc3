//! Arena of per-key locks
//!
//! Each encoded key maps to an `Arc<Mutex<()>>` that exists only while some
//! thread holds or waits for it. Writers to distinct keys never contend.
//!
//! # Reclamation
//!
//! A [`KeyGuard`] releases its mutex on drop and then removes the map entry
//! if no other thread holds a clone of the `Arc`. Both the clone in
//! [`KeyLockTable::lock`] and the removal run under the same DashMap shard
//! lock, so a waiter can never end up holding a mutex that was already
//! evicted.

use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use rustc_hash::FxHasher;
use tracing::trace;

type LockMap = DashMap<Vec<u8>, Arc<Mutex<()>>, BuildHasherDefault<FxHasher>>;

/// Per-key mutual exclusion
#[derive(Default)]
pub struct KeyLockTable {
    locks: LockMap,
}

impl KeyLockTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is exclusively held by the caller
    pub fn lock(&self, key: &[u8]) -> KeyGuard<'_> {
        let mutex = self.handle(key);
        let guard = match mutex.try_lock_arc() {
            Some(guard) => guard,
            None => {
                trace!(target: "qpledger::locks", key_len = key.len(), "Waiting for contended key");
                mutex.lock_arc()
            }
        };
        KeyGuard {
            table: self,
            key: key.to_vec(),
            guard: Some(guard),
        }
    }

    /// Take `key` only if nobody else holds it
    pub fn try_lock(&self, key: &[u8]) -> Option<KeyGuard<'_>> {
        let mutex = self.handle(key);
        match mutex.try_lock_arc() {
            Some(guard) => Some(KeyGuard {
                table: self,
                key: key.to_vec(),
                guard: Some(guard),
            }),
            None => {
                drop(mutex);
                self.reclaim(key);
                None
            }
        }
    }

    /// Number of live lock handles
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no key is held or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn handle(&self, key: &[u8]) -> Arc<Mutex<()>> {
        // Clone under the shard lock; the RefMut drops before we block.
        Arc::clone(&self.locks.entry(key.to_vec()).or_default())
    }

    fn reclaim(&self, key: &[u8]) {
        self.locks.remove_if(key, |_, m| Arc::strong_count(m) == 1);
    }
}

impl std::fmt::Debug for KeyLockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockTable")
            .field("live", &self.locks.len())
            .finish()
    }
}

/// Exclusive hold on one key; released on drop, including unwinding
pub struct KeyGuard<'a> {
    table: &'a KeyLockTable,
    key: Vec<u8>,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KeyGuard<'_> {
    /// Key this guard holds
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex (and its Arc clone) before checking contention.
        drop(self.guard.take());
        self.table.reclaim(&self.key);
    }
}
