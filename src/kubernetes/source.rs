//! Kubernetes resource source
//!
//! Lists and watches one custom resource kind, either cluster-wide or in a
//! single namespace, and normalizes the raw watch events.

use crate::domain::{ManagedResource, ResourceEvent, ResourceList, ResourceSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use kube::{Client, Resource};
use std::marker::PhantomData;
use tracing::trace;

/// Server-side watch timeout; the session ends when it elapses
const WATCH_TIMEOUT_SECS: u32 = 290;

/// Lists and watches `K` through the Kubernetes API
pub struct KubeResourceSource<K> {
    client: Client,
    namespace: Option<String>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeResourceSource<K>
where
    K: ManagedResource + Resource<Scope = NamespaceResourceScope>,
{
    /// Watch every namespace, or only `namespace` when set
    pub fn new(client: Client, namespace: Option<String>) -> Self {
        Self {
            client,
            namespace,
            _kind: PhantomData,
        }
    }

    fn api(&self) -> Api<K> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Map a raw watch event; bookmarks carry nothing for the engine
pub fn normalize_event<K>(event: WatchEvent<K>) -> Option<ResourceEvent<K>> {
    match event {
        WatchEvent::Added(obj) => Some(ResourceEvent::Added(obj)),
        WatchEvent::Modified(obj) => Some(ResourceEvent::Modified(obj)),
        WatchEvent::Deleted(obj) => Some(ResourceEvent::Deleted(obj)),
        WatchEvent::Bookmark(_) => None,
        WatchEvent::Error(err) => Some(ResourceEvent::Error {
            code: err.code,
            message: err.message,
        }),
    }
}

#[async_trait]
impl<K> ResourceSource<K> for KubeResourceSource<K>
where
    K: ManagedResource + Resource<Scope = NamespaceResourceScope>,
{
    async fn list(&self) -> Result<ResourceList<K>> {
        let list = self.api().list(&ListParams::default()).await?;
        let version = list.metadata.resource_version.unwrap_or_default();

        trace!(kind = %K::KIND, items = list.items.len(), %version, "Listed");
        Ok(ResourceList {
            items: list.items,
            version,
        })
    }

    async fn watch(&self, version: &str) -> Result<BoxStream<'static, Result<ResourceEvent<K>>>> {
        let params = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
        let stream = self.api().watch(&params, version).await?;

        Ok(stream
            .filter_map(|item| async move {
                match item {
                    Ok(event) => normalize_event(event).map(Ok),
                    Err(e) => Some(Err(Error::from(e))),
                }
            })
            .boxed())
    }
}
