//! Managed Resource Registry
//!
//! Concurrent map from `namespace/name` to the latest known snapshot of a
//! resource, one instance per kind. Individual operations are atomic; a
//! snapshot is a point-in-time copy and does not observe later mutations.

use crate::domain::{ManagedResource, ResourceKey};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// Registry Statistics
// =============================================================================

/// Counters for registry activity
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Total upserts
    pub upserts: AtomicU64,
    /// Total removals
    pub removals: AtomicU64,
    /// Total full resyncs
    pub resyncs: AtomicU64,
}

/// Point-in-time copy of registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegistryStatsSnapshot {
    pub entries: usize,
    pub upserts: u64,
    pub removals: u64,
    pub resyncs: u64,
}

// =============================================================================
// Resync Diff
// =============================================================================

/// Outcome of replacing the registry with a full list
#[derive(Debug, Clone)]
pub struct ResyncDiff<K> {
    /// New entries, or entries whose spec generation changed
    pub changed: Vec<K>,
    /// Entries that were registered but are absent from the list
    pub removed: Vec<K>,
    /// Entries present before and after with an unchanged generation
    pub unchanged: usize,
}

// =============================================================================
// Managed Registry
// =============================================================================

/// Registry of the currently known resources of one kind
#[derive(Debug)]
pub struct ManagedRegistry<K: ManagedResource> {
    entries: DashMap<ResourceKey, K>,
    stats: RegistryStats,
    /// Set once the first full list has been applied
    synced: AtomicBool,
}

impl<K: ManagedResource> Default for ManagedRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ManagedResource> ManagedRegistry<K> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: RegistryStats::default(),
            synced: AtomicBool::new(false),
        }
    }

    /// Insert or replace a snapshot, returning the previous one
    pub fn upsert(&self, resource: K) -> Option<K> {
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(resource.key(), resource)
    }

    /// Replace a snapshot only if the key is already registered
    ///
    /// Returns the previous snapshot, or `None` (and leaves the registry
    /// untouched) for an unknown key.
    pub fn replace_existing(&self, resource: K) -> Option<K> {
        let key = resource.key();
        let mut entry = self.entries.get_mut(&key)?;
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);
        Some(std::mem::replace(entry.value_mut(), resource))
    }

    /// Remove a snapshot
    pub fn remove(&self, key: &ResourceKey) -> Option<K> {
        let removed = self.entries.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.stats.removals.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Get a copy of a snapshot
    pub fn get(&self, key: &ResourceKey) -> Option<K> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Check whether a key is registered
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Point-in-time copy of every entry, ordered by key
    pub fn snapshot(&self) -> Vec<K> {
        let mut items: Vec<(ResourceKey, K)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items.into_iter().map(|(_, v)| v).collect()
    }

    /// Registered keys, ordered
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Replace the whole registry with a full list
    pub fn replace_all(&self, items: Vec<K>) -> ResyncDiff<K> {
        let listed: HashSet<ResourceKey> = items.iter().map(|r| r.key()).collect();

        let stale: Vec<ResourceKey> = self
            .entries
            .iter()
            .filter(|e| !listed.contains(e.key()))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(stale.len());
        for key in stale {
            if let Some((_, v)) = self.entries.remove(&key) {
                removed.push(v);
            }
        }

        let mut changed = Vec::new();
        let mut unchanged = 0;
        for item in items {
            let previous = self.entries.insert(item.key(), item.clone());
            match previous {
                Some(prev) if prev.generation() == item.generation() => unchanged += 1,
                _ => changed.push(item),
            }
        }

        self.stats.resyncs.fetch_add(1, Ordering::Relaxed);
        self.stats
            .removals
            .fetch_add(removed.len() as u64, Ordering::Relaxed);
        self.synced.store(true, Ordering::Release);

        ResyncDiff {
            changed,
            removed,
            unchanged,
        }
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the first full list has been applied
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Get registry counters
    pub fn stats(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            entries: self.entries.len(),
            upserts: self.stats.upserts.load(Ordering::Relaxed),
            removals: self.stats.removals.load(Ordering::Relaxed),
            resyncs: self.stats.resyncs.load(Ordering::Relaxed),
        }
    }
}
