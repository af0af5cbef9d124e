//! Resource Watch
//!
//! Supervised list-then-watch loop for one kind. Each session lists every
//! object, replaces the registry with the list, then streams changes from
//! the list's version. When a session ends for any reason the loop waits a
//! fixed delay and starts over with a fresh list, so events missed while
//! disconnected are recovered by the resync.

use crate::controller::dispatcher::{Dispatcher, Flow};
use crate::domain::{ManagedResource, ResourceSourceRef};
use crate::error::{Error, ErrorAction, Result};
use backoff::backoff::{Backoff, Constant};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a watch session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the stream
    Closed,
    /// The resume version expired
    Expired,
    /// Shutdown was requested
    Shutdown,
}

/// Watch supervisor for one kind
pub struct ResourceWatch<K: ManagedResource> {
    source: ResourceSourceRef<K>,
    dispatcher: Arc<Dispatcher<K>>,
    retry_delay: Duration,
}

impl<K: ManagedResource> ResourceWatch<K> {
    pub fn new(
        source: ResourceSourceRef<K>,
        dispatcher: Arc<Dispatcher<K>>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            dispatcher,
            retry_delay,
        }
    }

    /// Run sessions until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        let mut backoff = Constant::new(self.retry_delay);
        info!(kind = %K::KIND, "Starting resource watch");

        loop {
            match self.run_session(&shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(end) => info!(kind = %K::KIND, "Watch session ended: {:?}", end),
                Err(e) if e.action() == ErrorAction::Resync => {
                    info!(kind = %K::KIND, "Watch disrupted, relisting: {}", e)
                }
                Err(e) => warn!(kind = %K::KIND, "Watch session failed: {}", e),
            }

            let delay = backoff.next_backoff().unwrap_or(self.retry_delay);
            debug!(kind = %K::KIND, "Reconnecting watch in {:?}", delay);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            self.dispatcher.metrics().watch_reconnect(K::KIND);
        }

        info!(kind = %K::KIND, "Resource watch stopped");
    }

    /// One list-then-watch session
    pub async fn run_session(&self, shutdown: &CancellationToken) -> Result<SessionEnd> {
        let list = self.source.list().await?;
        debug!(
            kind = %K::KIND,
            items = list.items.len(),
            version = %list.version,
            "Listed resources"
        );
        self.dispatcher.resync(list.items).await;

        let mut stream = self.source.watch(&list.version).await?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(SessionEnd::Shutdown),
                next = stream.next() => match next {
                    None => return Ok(SessionEnd::Closed),
                    Some(Err(e)) => {
                        return Err(Error::WatchDisrupted {
                            kind: K::KIND.to_string(),
                            reason: e.to_string(),
                        })
                    }
                    Some(Ok(event)) => {
                        if self.dispatcher.handle_event(event).await == Flow::Resync {
                            return Ok(SessionEnd::Expired);
                        }
                    }
                },
            }
        }
    }
}
