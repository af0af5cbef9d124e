//! Event Dispatcher
//!
//! Applies normalized watch events to one kind's registry and triggers the
//! matching handler work. All work on a key runs under that key's
//! single-flight lock, and apply work re-checks the registry once the lock
//! is held so a key deleted meanwhile is never re-created. Teardowns that
//! fail with a retryable error stay pending until a later pass succeeds.

use crate::controller::handlers::{ApplyOutcome, ResourceHandler};
use crate::controller::status::StatusReporter;
use crate::domain::{ManagedResource, ResourceEvent, ResourceKey};
use crate::metrics::ControllerMetrics;
use crate::registry::{KeyedLocks, ManagedRegistry};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// HTTP status of an expired watch resource version
const GONE: u16 = 410;

/// What the watch session should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// End the session and relist
    Resync,
}

/// Result of a scheduled reconcile attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAttempt {
    Done(ApplyOutcome),
    /// Another task holds the key
    Busy,
    /// The key left the registry before the lock was acquired
    Gone,
}

/// Routes events and scheduled work for one kind
pub struct Dispatcher<K: ManagedResource> {
    registry: Arc<ManagedRegistry<K>>,
    locks: Arc<KeyedLocks>,
    handler: Arc<dyn ResourceHandler<K>>,
    reporter: Arc<StatusReporter>,
    metrics: ControllerMetrics,
    /// Deleted resources whose teardown failed and must be retried
    pending_teardowns: DashMap<ResourceKey, K>,
}

impl<K: ManagedResource> Dispatcher<K> {
    pub fn new(
        registry: Arc<ManagedRegistry<K>>,
        handler: Arc<dyn ResourceHandler<K>>,
        reporter: Arc<StatusReporter>,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            registry,
            locks: Arc::new(KeyedLocks::new()),
            handler,
            reporter,
            metrics,
            pending_teardowns: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ManagedRegistry<K>> {
        &self.registry
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    /// Number of teardowns waiting for a retry
    pub fn pending_teardowns(&self) -> usize {
        self.pending_teardowns.len()
    }

    /// Handle one watch event
    pub async fn handle_event(&self, event: ResourceEvent<K>) -> Flow {
        self.metrics.watch_event(K::KIND, event.name());

        match event {
            ResourceEvent::Added(resource) => {
                let key = resource.key();
                info!(kind = %K::KIND, key = %key, "Resource added");
                self.registry.upsert(resource.clone());
                self.apply(&resource).await;
            }
            ResourceEvent::Modified(resource) => {
                let key = resource.key();
                match self.registry.replace_existing(resource.clone()) {
                    None => {
                        debug!(kind = %K::KIND, key = %key, "Ignoring modification of unmanaged resource");
                    }
                    Some(previous) if previous.generation() == resource.generation() => {
                        debug!(kind = %K::KIND, key = %key, "Spec unchanged, snapshot refreshed");
                    }
                    Some(_) => {
                        info!(kind = %K::KIND, key = %key, "Resource modified");
                        self.apply(&resource).await;
                    }
                }
            }
            ResourceEvent::Deleted(resource) => {
                let key = resource.key();
                info!(kind = %K::KIND, key = %key, "Resource deleted");
                self.registry.remove(&key);
                self.teardown(&resource).await;
            }
            ResourceEvent::Error { code, message } => {
                warn!(kind = %K::KIND, code, "Watch error: {}", message);
                if code == GONE {
                    return Flow::Resync;
                }
            }
        }

        Flow::Continue
    }

    /// Replace the registry with a full list, applying new or changed
    /// entries and tearing down entries that vanished
    pub async fn resync(&self, items: Vec<K>) {
        let diff = self.registry.replace_all(items);
        info!(
            kind = %K::KIND,
            changed = diff.changed.len(),
            removed = diff.removed.len(),
            unchanged = diff.unchanged,
            "Registry resynced"
        );

        for resource in &diff.removed {
            self.teardown(resource).await;
        }
        for resource in &diff.changed {
            self.apply(resource).await;
        }
    }

    /// Apply a resource and refresh its status, waiting for the key
    ///
    /// Returns `None` without touching the handler when the key is no
    /// longer registered once the lock is held.
    pub async fn apply(&self, resource: &K) -> Option<ApplyOutcome> {
        let key = resource.key();
        let _guard = self.locks.lock(&key).await;
        if !self.registry.contains(&key) {
            debug!(kind = %K::KIND, key = %key, "Skipping apply of unregistered resource");
            return None;
        }
        self.pending_teardowns.remove(&key);
        let outcome = self.handler.apply(resource).await;
        self.finish(&key, resource, &outcome).await;
        Some(outcome)
    }

    /// Tear down a resource's backing state, waiting for the key
    ///
    /// A retryable failure leaves the resource pending for
    /// [`Dispatcher::retry_teardowns`].
    pub async fn teardown(&self, resource: &K) {
        let key = resource.key();
        {
            let _guard = self.locks.lock(&key).await;
            self.run_teardown(&key, resource).await;
        }
        self.locks.forget(&key);
    }

    /// Retry every pending teardown whose key is still unregistered
    ///
    /// Returns the number of teardowns that completed.
    pub async fn retry_teardowns(&self) -> usize {
        let pending: Vec<(ResourceKey, K)> = self
            .pending_teardowns
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut completed = 0;
        for (key, resource) in pending {
            let Some(guard) = self.locks.try_lock(&key) else {
                debug!(kind = %K::KIND, key = %key, "Skipping busy teardown retry");
                continue;
            };
            if self.registry.contains(&key) {
                debug!(kind = %K::KIND, key = %key, "Resource re-registered, dropping pending teardown");
                self.pending_teardowns.remove(&key);
                continue;
            }
            if self.run_teardown(&key, &resource).await {
                completed += 1;
            }
            drop(guard);
            self.locks.forget(&key);
        }
        completed
    }

    /// Reconcile a resource unless another task holds its key
    ///
    /// The registry's current copy is reconciled, so a key removed after the
    /// caller's snapshot was taken is reported as [`ReconcileAttempt::Gone`].
    pub async fn reconcile(&self, resource: &K) -> ReconcileAttempt {
        let key = resource.key();
        let Some(_guard) = self.locks.try_lock(&key) else {
            debug!(kind = %K::KIND, key = %key, "Skipping busy resource");
            return ReconcileAttempt::Busy;
        };
        let Some(current) = self.registry.get(&key) else {
            debug!(kind = %K::KIND, key = %key, "Skipping resource deleted since the pass began");
            return ReconcileAttempt::Gone;
        };
        let outcome = self.handler.reconcile(&current).await;
        self.finish(&key, &current, &outcome).await;
        ReconcileAttempt::Done(outcome)
    }

    /// Run the handler's teardown under a held lock, tracking failures
    async fn run_teardown(&self, key: &ResourceKey, resource: &K) -> bool {
        match self.handler.teardown(resource).await {
            Ok(()) => {
                info!(kind = %K::KIND, key = %key, "Teardown complete");
                self.pending_teardowns.remove(key);
                true
            }
            Err(e) if e.is_retryable() => {
                warn!(kind = %K::KIND, key = %key, "Teardown failed, will retry: {}", e);
                self.pending_teardowns.insert(key.clone(), resource.clone());
                false
            }
            Err(e) => {
                warn!(kind = %K::KIND, key = %key, "Teardown failed: {}", e);
                self.pending_teardowns.remove(key);
                false
            }
        }
    }

    async fn finish(&self, key: &ResourceKey, resource: &K, outcome: &ApplyOutcome) {
        self.metrics.apply(K::KIND, outcome.metric_label());

        if outcome.is_ready() {
            debug!(kind = %K::KIND, key = %key, "{}", outcome.message);
        } else {
            warn!(
                kind = %K::KIND,
                key = %key,
                reason = %outcome.reason,
                "Apply failed: {}",
                outcome.message
            );
        }

        if let Err(e) = self.reporter.report(resource, outcome).await {
            warn!(kind = %K::KIND, key = %key, "Status write failed: {}", e);
        }
    }
}
