//! Per-key single-flight guard
//!
//! At most one apply, teardown or reconcile runs for a resource key at a
//! time. Watch-triggered work waits for the key; scheduled passes skip keys
//! that are busy.

use crate::domain::ResourceKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by resource key
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<ResourceKey, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &ResourceKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait until the key is free and hold it
    pub async fn lock(&self, key: &ResourceKey) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Hold the key if it is free, `None` if another task holds it
    pub fn try_lock(&self, key: &ResourceKey) -> Option<OwnedMutexGuard<()>> {
        self.slot(key).try_lock_owned().ok()
    }

    /// Drop the slot of a key nobody holds or waits on
    pub fn forget(&self, key: &ResourceKey) {
        self.locks
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
