//! Per-key critical sections
//!
//! Each 32-byte key gets its own mutex, created on demand and dropped once no
//! caller holds or waits on it. Calls on different keys never contend beyond
//! the brief table lookup.

use crate::crypto::Hash32;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<Hash32, Arc<Mutex<()>>>>,
}

/// Held for the duration of one critical section
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: Hash32,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it until the guard drops
    pub fn lock(&self, key: Hash32) -> KeyGuard<'_> {
        let entry = self.table.lock().entry(key).or_default().clone();
        let guard = entry.lock_arc();
        KeyGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = self.locks.table.lock();
        let unused = table
            .get(&self.key)
            .map(|entry| Arc::strong_count(entry) == 1)
            .unwrap_or(false);
        if unused {
            table.remove(&self.key);
        }
    }
}
