//! HTTP cluster gateway
//!
//! Resolves a cluster name to its registered controller endpoint and talks
//! to the Pinot REST API. An unregistered cluster and a non-2xx response are
//! expected negative outcomes; only transport failures are errors.

use crate::domain::ClusterGateway;
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gateway to the Pinot controller REST API of every registered cluster
pub struct HttpClusterGateway {
    client: reqwest::Client,
    endpoints: DashMap<String, String>,
}

impl HttpClusterGateway {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoints: DashMap::new(),
        })
    }

    fn url(&self, cluster: &str, path: &str) -> Option<String> {
        self.endpoints
            .get(cluster)
            .map(|base| format!("{}{}", base.trim_end_matches('/'), path))
    }

    fn request(&self, cluster: &str, method: Method, path: &str) -> Option<RequestBuilder> {
        match self.url(cluster, path) {
            Some(url) => Some(self.client.request(method, url)),
            None => {
                warn!(cluster, "No endpoint registered for cluster");
                None
            }
        }
    }

    /// Send a request, returning whether the controller accepted it
    async fn send(&self, cluster: &str, what: &str, request: Option<RequestBuilder>) -> Result<bool> {
        let Some(request) = request else {
            return Ok(false);
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(cluster, what, %status, "Controller accepted request");
            Ok(true)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(cluster, what, %status, body = %body, "Controller rejected request");
            Ok(false)
        }
    }

    async fn push(&self, cluster: &str, path: &str, what: &str, payload: &str) -> Result<bool> {
        let request = self.request(cluster, Method::POST, path).map(|r| {
            r.header(CONTENT_TYPE, "application/json")
                .body(payload.to_string())
        });
        self.send(cluster, what, request).await
    }

    async fn delete(&self, cluster: &str, collection: &str, name: &str) -> Result<bool> {
        let path = format!("/{}/{}", collection, urlencoding::encode(name));
        let request = self.request(cluster, Method::DELETE, &path);
        self.send(cluster, collection, request).await
    }
}

/// Flatten a reload response into per-segment status lines
pub fn reload_statuses(body: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .map(|(segment, status)| match status {
                serde_json::Value::String(s) => format!("{}: {}", segment, s),
                other => format!("{}: {}", segment, other),
            })
            .collect(),
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        _ if body.trim().is_empty() => Vec::new(),
        _ => vec![body.trim().to_string()],
    }
}

#[async_trait]
impl ClusterGateway for HttpClusterGateway {
    fn register_endpoint(&self, cluster: &str, endpoint: &str) {
        self.endpoints
            .insert(cluster.to_string(), endpoint.to_string());
        info!(cluster, endpoint, "Registered cluster endpoint");
    }

    fn unregister_endpoint(&self, cluster: &str) {
        if self.endpoints.remove(cluster).is_some() {
            info!(cluster, "Unregistered cluster endpoint");
        }
    }

    fn endpoint(&self, cluster: &str) -> Option<String> {
        self.endpoints.get(cluster).map(|e| e.value().clone())
    }

    async fn push_schema(&self, cluster: &str, _name: &str, payload: &str) -> Result<bool> {
        self.push(cluster, "/schemas", "schemas", payload).await
    }

    async fn delete_schema(&self, cluster: &str, name: &str) -> Result<bool> {
        self.delete(cluster, "schemas", name).await
    }

    async fn push_table(&self, cluster: &str, _name: &str, payload: &str) -> Result<bool> {
        self.push(cluster, "/tables", "tables", payload).await
    }

    async fn delete_table(&self, cluster: &str, name: &str) -> Result<bool> {
        self.delete(cluster, "tables", name).await
    }

    async fn push_tenant(&self, cluster: &str, _name: &str, payload: &str) -> Result<bool> {
        self.push(cluster, "/tenants", "tenants", payload).await
    }

    async fn delete_tenant(&self, cluster: &str, name: &str) -> Result<bool> {
        self.delete(cluster, "tenants", name).await
    }

    async fn reload_table_segments(&self, cluster: &str, table: &str) -> Result<Vec<String>> {
        let path = format!("/segments/{}/reload", urlencoding::encode(table));
        let Some(request) = self.request(cluster, Method::POST, &path) else {
            return Err(Error::GatewayUnavailable {
                cluster: cluster.to_string(),
                reason: "no endpoint registered".to_string(),
            });
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(cluster, table, %status, "Segment reload rejected");
            return Ok(vec![format!("reload failed: {}", status)]);
        }
        Ok(reload_statuses(&body))
    }

    async fn check_health(&self, cluster: &str) -> Result<bool> {
        let request = self.request(cluster, Method::GET, "/health");
        self.send(cluster, "health", request).await
    }

    async fn cluster_info(&self, cluster: &str) -> Result<Option<String>> {
        let Some(request) = self.request(cluster, Method::GET, "/cluster/info") else {
            return Ok(None);
        };

        let response = request.send().await?;
        if response.status().is_success() {
            Ok(Some(response.text().await?))
        } else {
            warn!(cluster, status = %response.status(), "Cluster info unavailable");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_controller(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn gateway() -> HttpClusterGateway {
        HttpClusterGateway::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_registry() {
        let gw = gateway();
        assert!(gw.endpoint("c1").is_none());

        gw.register_endpoint("c1", "http://n1-service.default.svc:9000/");
        assert_eq!(
            gw.url("c1", "/schemas").as_deref(),
            Some("http://n1-service.default.svc:9000/schemas")
        );

        gw.unregister_endpoint("c1");
        assert!(gw.endpoint("c1").is_none());
    }

    #[tokio::test]
    async fn test_unknown_cluster() {
        let gw = gateway();
        assert!(!gw.push_schema("ghost", "events", "{}").await.unwrap());
        assert!(!gw.delete_table("ghost", "events").await.unwrap());
        assert!(!gw.check_health("ghost").await.unwrap());
        assert!(gw.cluster_info("ghost").await.unwrap().is_none());
        assert_matches::assert_matches!(
            gw.reload_table_segments("ghost", "events").await,
            Err(Error::GatewayUnavailable { .. })
        );
    }

    #[tokio::test]
    async fn test_against_controller() {
        let app = Router::new()
            .route("/schemas", post(|| async { StatusCode::OK }))
            .route(
                "/tables",
                post(|| async { (StatusCode::BAD_REQUEST, "invalid table config") }),
            )
            .route(
                "/tenants/:name",
                delete(|Path(name): Path<String>| async move {
                    if name == "tenant a" {
                        StatusCode::OK
                    } else {
                        StatusCode::NOT_FOUND
                    }
                }),
            )
            .route(
                "/segments/:table/reload",
                post(|| async { Json(json!({"events_0": "SUCCESS"})) }),
            )
            .route("/health", get(|| async { "OK" }))
            .route("/cluster/info", get(|| async { r#"{"clusterName":"c1"}"# }));

        let gw = gateway();
        gw.register_endpoint("c1", &spawn_controller(app).await);

        assert!(gw.push_schema("c1", "events", "{}").await.unwrap());
        assert!(!gw.push_table("c1", "events", "{}").await.unwrap());
        assert!(gw.delete_tenant("c1", "tenant a").await.unwrap());
        assert!(!gw.delete_tenant("c1", "other").await.unwrap());
        assert_eq!(
            gw.reload_table_segments("c1", "events").await.unwrap(),
            vec!["events_0: SUCCESS"]
        );
        assert!(gw.check_health("c1").await.unwrap());
        assert_eq!(
            gw.cluster_info("c1").await.unwrap().as_deref(),
            Some(r#"{"clusterName":"c1"}"#)
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let gw = gateway();
        // Nothing listens on port 1
        gw.register_endpoint("c1", "http://127.0.0.1:1");
        assert_matches::assert_matches!(gw.check_health("c1").await, Err(Error::Http(_)));
    }

    #[test]
    fn test_reload_statuses() {
        assert_eq!(reload_statuses(r#"["seg_0: SUCCESS"]"#), vec!["seg_0: SUCCESS"]);
        assert_eq!(reload_statuses("reload queued"), vec!["reload queued"]);
        assert!(reload_statuses("").is_empty());
    }
}
