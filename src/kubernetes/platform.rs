//! Kubernetes workload platform
//!
//! Server-side applies rendered manifests with a fixed field manager and
//! deletes a cluster's objects by label selector.

use crate::domain::{
    ConfigBundlePlan, EndpointPlan, WorkloadPlan, WorkloadPlatform, APP_LABEL, APP_LABEL_VALUE,
    CLUSTER_LABEL,
};
use crate::error::{Error, Result};
use crate::kubernetes::manifests;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

/// Label selector matching every backing object of a cluster
pub fn cluster_selector(cluster: &str) -> String {
    format!("{}={},{}={}", APP_LABEL, APP_LABEL_VALUE, CLUSTER_LABEL, cluster)
}

/// Workload platform backed by the Kubernetes API
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    field_manager: String,
}

impl KubePlatform {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    async fn apply<K>(&self, namespace: &str, name: &str, obj: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(&self.field_manager).force(),
            &Patch::Apply(obj),
        )
        .await
        .map_err(|e| Error::PlatformOperation {
            object: format!("{}/{}/{}", K::kind(&()), namespace, name),
            operation: "apply".to_string(),
            reason: e.to_string(),
        })?;

        debug!("Applied {} {}/{}", K::kind(&()), namespace, name);
        Ok(())
    }

    /// Delete every object of one type matching the selector
    async fn delete_matching<K>(&self, namespace: &str, selector: &str) -> Result<usize>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;

        let mut deleted = 0;
        for obj in list.items {
            let name = obj.name_any();
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => deleted += 1,
                Err(kube::Error::Api(ae)) if ae.code == 404 => {}
                Err(e) => {
                    return Err(Error::PlatformOperation {
                        object: format!("{}/{}/{}", K::kind(&()), namespace, name),
                        operation: "delete".to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl WorkloadPlatform for KubePlatform {
    async fn apply_workload(&self, plan: &WorkloadPlan) -> Result<()> {
        self.apply(&plan.namespace, &plan.name, &manifests::deployment(plan))
            .await
    }

    async fn apply_endpoint(&self, plan: &EndpointPlan) -> Result<()> {
        self.apply(&plan.namespace, &plan.name, &manifests::service(plan))
            .await
    }

    async fn apply_config_bundle(&self, plan: &ConfigBundlePlan) -> Result<()> {
        self.apply(&plan.namespace, &plan.name, &manifests::config_map(plan))
            .await
    }

    async fn delete_cluster_objects(&self, namespace: &str, cluster: &str) -> Result<usize> {
        let selector = cluster_selector(cluster);

        let deployments = self.delete_matching::<Deployment>(namespace, &selector).await?;
        let services = self.delete_matching::<Service>(namespace, &selector).await?;
        let config_maps = self.delete_matching::<ConfigMap>(namespace, &selector).await?;

        info!(
            namespace,
            cluster, deployments, services, config_maps, "Deleted cluster objects"
        );
        Ok(deployments + services + config_maps)
    }
}
