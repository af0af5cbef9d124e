//! REST API Handlers
//!
//! Read-only views of what the engine currently manages, plus live cluster
//! metadata fetched through the gateway.

use crate::controller::Registries;
use crate::domain::{ClusterGatewayRef, ResourceKey, ResourceKind};
use crate::registry::RegistryStatsSnapshot;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

// =============================================================================
// Response Types
// =============================================================================

/// Engine status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub synced: bool,
    pub counts: BTreeMap<String, usize>,
    pub registries: BTreeMap<String, RegistryStatsSnapshot>,
}

/// Live metadata of a managed cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfoResponse {
    pub cluster: String,
    pub endpoint: Option<String>,
    /// Controller payload, parsed as JSON when possible
    pub info: serde_json::Value,
}

/// Managed-check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedResponse {
    pub managed: bool,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn new(status: StatusCode, error: &str, message: String) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                error: error.into(),
                message,
                details: None,
            }),
        )
    }

    fn invalid_kind(kind: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                error: "invalid_resource_type".into(),
                message: format!(
                    "Invalid resource type: {}. Use 'clusters', 'schemas', 'tables' or 'tenants'",
                    kind
                ),
                details: None,
            }),
        )
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    registries: Arc<Registries>,
    gateway: ClusterGatewayRef,
}

impl RestRouter {
    pub fn new(registries: Arc<Registries>, gateway: ClusterGatewayRef) -> Self {
        Self {
            registries,
            gateway,
        }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            registries: self.registries,
            gateway: self.gateway,
        };

        Router::new()
            .route("/", get(index))
            .route("/api/v1/health", get(health_check))
            .route("/api/v1/status", get(engine_status))
            .route("/api/v1/clusters", get(list_clusters))
            .route("/api/v1/schemas", get(list_schemas))
            .route("/api/v1/tables", get(list_tables))
            .route("/api/v1/tenants", get(list_tenants))
            .route("/api/v1/clusters/:namespace/:name/info", get(cluster_info))
            .route("/api/v1/managed/:kind/:namespace/:name", get(is_managed))
            .route("/api/v1/:kind/:namespace/:name", get(get_resource))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    registries: Arc<Registries>,
    gateway: ClusterGatewayRef,
}

// =============================================================================
// Handlers
// =============================================================================

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": crate::NAME,
        "version": crate::VERSION,
        "endpoints": [
            "/api/v1/health",
            "/api/v1/status",
            "/api/v1/clusters",
            "/api/v1/schemas",
            "/api/v1/tables",
            "/api/v1/tenants",
            "/api/v1/{kind}/{namespace}/{name}",
            "/api/v1/clusters/{namespace}/{name}/info",
            "/api/v1/managed/{kind}/{namespace}/{name}",
        ],
    }))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "UP"})))
}

async fn engine_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: crate::VERSION.to_string(),
        synced: state.registries.all_synced(),
        counts: state.registries.counts(),
        registries: state.registries.stats(),
    })
}

fn list_kind(state: &AppState, kind: ResourceKind) -> impl IntoResponse {
    let items = state.registries.list(kind);
    debug!(%kind, count = items.len(), "Listing managed resources");
    Json(items)
}

async fn list_clusters(State(state): State<AppState>) -> impl IntoResponse {
    list_kind(&state, ResourceKind::Cluster)
}

async fn list_schemas(State(state): State<AppState>) -> impl IntoResponse {
    list_kind(&state, ResourceKind::Schema)
}

async fn list_tables(State(state): State<AppState>) -> impl IntoResponse {
    list_kind(&state, ResourceKind::Table)
}

async fn list_tenants(State(state): State<AppState>) -> impl IntoResponse {
    list_kind(&state, ResourceKind::Tenant)
}

async fn get_resource(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let Ok(kind) = kind.parse::<ResourceKind>() else {
        return ApiErrorResponse::invalid_kind(&kind).into_response();
    };

    let key = ResourceKey::new(namespace, name);
    match state.registries.get(kind, &key) {
        Some(resource) => (StatusCode::OK, Json(resource)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse {
                error: "not_found".into(),
                message: format!("{} {} is not managed", kind, key),
                details: None,
            }),
        )
            .into_response(),
    }
}

async fn cluster_info(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = ResourceKey::new(namespace, name);
    if !state.registries.is_managed(ResourceKind::Cluster, &key) {
        return ApiErrorResponse::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("cluster {} is not managed", key),
        )
        .into_response();
    }

    match state.gateway.cluster_info(&key.name).await {
        Ok(Some(raw)) => {
            let info = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));
            let response = ClusterInfoResponse {
                endpoint: state.gateway.endpoint(&key.name),
                cluster: key.name,
                info,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => ApiErrorResponse::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "cluster_unavailable",
            format!("cluster {} has no reachable controller", key),
        )
        .into_response(),
        Err(e) => {
            warn!(cluster = %key, "Cluster info request failed: {}", e);
            ApiErrorResponse::new(
                StatusCode::BAD_GATEWAY,
                "gateway_error",
                format!("cluster {} info request failed: {}", key, e),
            )
            .into_response()
        }
    }
}

async fn is_managed(
    State(state): State<AppState>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let Ok(kind) = kind.parse::<ResourceKind>() else {
        return ApiErrorResponse::invalid_kind(&kind).into_response();
    };

    let managed = state
        .registries
        .is_managed(kind, &ResourceKey::new(namespace, name));
    (StatusCode::OK, Json(ManagedResponse { managed })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PinotSchema, PinotSchemaSpec};
    use crate::domain::ClusterGateway;
    use crate::testing::{sample_cluster, FakeGateway};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        router_with(Arc::new(FakeGateway::new()))
    }

    fn router_with(gateway: Arc<FakeGateway>) -> Router {
        let registries = Arc::new(Registries::new());
        registries.clusters.upsert(sample_cluster());

        let mut schema = PinotSchema::new(
            "events",
            PinotSchemaSpec {
                pinot_cluster: "c1".into(),
                schema_json: "{}".into(),
            },
        );
        schema.metadata.namespace = Some("analytics".into());
        registries.schemas.upsert(schema);

        RestRouter::new(registries, gateway).build()
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        request(router(), uri).await
    }

    async fn request(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_status() {
        let (status, body) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");

        let (status, body) = get_json("/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"]["clusters"], 1);
        assert_eq!(body["counts"]["schemas"], 1);
        assert_eq!(body["counts"]["tables"], 0);
        assert_eq!(body["synced"], false);

        let parsed: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.registries["clusters"].entries, 1);
        assert_eq!(parsed.registries["clusters"].upserts, 1);
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let (status, body) = get_json("/api/v1/schemas").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["metadata"]["name"], "events");

        let (status, body) = get_json("/api/v1/clusters/default/c1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spec"]["deploymentOrder"][0], "controller");

        let (status, _) = get_json("/api/v1/tables/default/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_managed_check() {
        let (status, body) = get_json("/api/v1/managed/schema/analytics/events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["managed"], true);

        let (_, body) = get_json("/api/v1/managed/schemas/default/events").await;
        assert_eq!(body["managed"], false);

        let (status, body) = get_json("/api/v1/managed/segments/default/events").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_resource_type");
    }

    #[tokio::test]
    async fn test_index() {
        let (status, body) = get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], crate::NAME);
    }

    #[tokio::test]
    async fn test_cluster_info() {
        let gateway = Arc::new(FakeGateway::new());
        gateway.register_endpoint("c1", "http://c1-n1.default.svc:9000");

        let (status, body) = request(router_with(gateway.clone()), "/api/v1/clusters/default/c1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cluster"], "c1");
        assert_eq!(body["endpoint"], "http://c1-n1.default.svc:9000");
        assert_eq!(body["info"]["endpoint"], "http://c1-n1.default.svc:9000");
        assert_eq!(gateway.calls(), vec!["cluster_info c1"]);
    }

    #[tokio::test]
    async fn test_cluster_info_errors() {
        let (status, body) = get_json("/api/v1/clusters/default/missing/info").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, body) = get_json("/api/v1/clusters/default/c1/info").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "cluster_unavailable");

        let gateway = Arc::new(FakeGateway::new());
        gateway.register_endpoint("c1", "http://c1-n1.default.svc:9000");
        gateway.set_unavailable(true);
        let (status, body) = request(router_with(gateway), "/api/v1/clusters/default/c1/info").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "gateway_error");
    }
}
