//! Manifest rendering
//!
//! Converts backing-object plans into the Kubernetes objects that are
//! server-side applied: a `Deployment` per node, a `Service` as its stable
//! endpoint, and a `ConfigMap` holding the rendered properties, mounted
//! into the node's container.

use crate::controller::planner::PROPERTIES_KEY;
use crate::domain::{ConfigBundlePlan, EndpointPlan, WorkloadPlan};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Name of the node container
pub const CONTAINER_NAME: &str = "pinot";

/// Where the config bundle is mounted
pub const CONFIG_MOUNT_PATH: &str = "/var/pinot/conf";

const CONFIG_VOLUME: &str = "pinot-config";

fn meta(namespace: &str, name: &str, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Render the node workload
pub fn deployment(plan: &WorkloadPlan) -> Deployment {
    let env = plan
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect();

    let ports = plan
        .ports
        .iter()
        .map(|p| ContainerPort {
            container_port: p.container_port,
            protocol: p.protocol.clone(),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(plan.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(env),
        ports: Some(ports),
        volume_mounts: Some(vec![VolumeMount {
            name: CONFIG_VOLUME.to_string(),
            mount_path: CONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Deployment {
        metadata: meta(&plan.namespace, &plan.name, &plan.labels),
        spec: Some(DeploymentSpec {
            replicas: Some(plan.replicas),
            selector: LabelSelector {
                match_labels: Some(plan.selector.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(plan.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: CONFIG_VOLUME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(format!("{}-config", plan.name)),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Render the node endpoint
pub fn service(plan: &EndpointPlan) -> Service {
    let ports = plan
        .ports
        .iter()
        .map(|p| ServicePort {
            name: Some(format!("port-{}", p.port)),
            port: p.port,
            target_port: p.target_port.map(IntOrString::Int),
            protocol: p.protocol.clone(),
            ..Default::default()
        })
        .collect();

    Service {
        metadata: meta(&plan.namespace, &plan.name, &plan.labels),
        spec: Some(ServiceSpec {
            type_: Some(plan.service_type.clone()),
            selector: Some(plan.selector.clone()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Render the node config bundle
pub fn config_map(plan: &ConfigBundlePlan) -> ConfigMap {
    ConfigMap {
        metadata: meta(&plan.namespace, &plan.name, &plan.labels),
        data: Some(plan.data.clone()),
        ..Default::default()
    }
}

/// Whether a config map carries rendered node properties
pub fn has_properties(cm: &ConfigMap) -> bool {
    cm.data
        .as_ref()
        .map(|d| d.contains_key(PROPERTIES_KEY))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::planner::plan_cluster;
    use crate::testing::sample_cluster;

    #[test]
    fn test_render_node_objects() {
        let plan = plan_cluster(&sample_cluster()).unwrap();
        let n2 = &plan.nodes[1];

        let deploy = deployment(&n2.workload);
        assert_eq!(deploy.metadata.name.as_deref(), Some("n2"));
        let spec = deploy.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(
            spec.selector.match_labels.unwrap().get("node").map(String::as_str),
            Some("n2")
        );
        let pod = spec.template.spec.unwrap();
        let container = &pod.containers[0];
        assert_eq!(container.name, "pinot");
        assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));
        let env = container.env.as_ref().unwrap();
        assert_eq!(env[0].name, "PINOT_NODE_TYPE");
        assert_eq!(env[0].value.as_deref(), Some("broker"));
        assert_eq!(
            pod.volumes.unwrap()[0].config_map.as_ref().unwrap().name.as_deref(),
            Some("n2-config")
        );

        let svc = service(&n2.endpoint);
        assert_eq!(svc.metadata.name.as_deref(), Some("n2-service"));
        let svc_spec = svc.spec.unwrap();
        assert_eq!(svc_spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(svc_spec.ports.unwrap()[0].port, 8099);

        let cm = config_map(&n2.config_bundle);
        assert_eq!(cm.metadata.name.as_deref(), Some("n2-config"));
        assert!(has_properties(&cm));
        assert_eq!(
            cm.metadata.labels.unwrap().get("cluster").map(String::as_str),
            Some("c1")
        );
    }

    #[test]
    fn test_apply_body_has_type_meta() {
        let plan = plan_cluster(&sample_cluster()).unwrap();
        let body = serde_json::to_value(deployment(&plan.nodes[0].workload)).unwrap();
        assert_eq!(body["apiVersion"], "apps/v1");
        assert_eq!(body["kind"], "Deployment");
    }
}
