use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::clients::NamespaceScope;
use crate::clients::registry::ClusterHandle;
use crate::error::ApiError;
use crate::models::metrics::{ContainerMetric, MetricsResponse};
use crate::models::views::{ClusterMetrics, ClusterSummary, NodeView, PodView, SkippedContext};
use crate::services::{resources, summary};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ClustersResponse {
    pub clusters: Vec<ClusterSummary>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub cluster: String,
    pub nodes: Vec<NodeView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct PodsResponse {
    pub cluster: String,
    pub pods: Vec<PodView>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct SkippedResponse {
    pub skipped: Vec<SkippedContext>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct PodsQuery {
    pub namespace: Option<String>,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "ClusterSight API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn handle_list_clusters(State(state): State<AppState>) -> Json<ClustersResponse> {
    let clusters = state.registry.list_clusters().await;
    Json(ClustersResponse {
        count: clusters.len(),
        clusters,
    })
}

async fn lookup(state: &AppState, name: &str) -> Result<std::sync::Arc<ClusterHandle>, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Cluster name is required"));
    }
    state.registry.get_handle(name).await.map_err(ApiError::not_found)
}

pub async fn handle_cluster_nodes(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NodesResponse>, ApiError> {
    let handle = lookup(&state, &name).await?;
    let nodes = resources::list_nodes(&handle)
        .await
        .map_err(|e| ApiError::query("Failed to get nodes", e))?;

    Ok(Json(NodesResponse {
        cluster: name,
        count: nodes.len(),
        nodes,
    }))
}

pub async fn handle_cluster_pods(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PodsQuery>,
) -> Result<Json<PodsResponse>, ApiError> {
    let handle = lookup(&state, &name).await?;
    let scope = match query.namespace {
        Some(ns) if !ns.is_empty() => NamespaceScope::Namespace(ns),
        _ => NamespaceScope::All,
    };
    let pods = resources::list_pods(&handle, &scope)
        .await
        .map_err(|e| ApiError::query("Failed to get pods", e))?;

    Ok(Json(PodsResponse {
        cluster: name,
        count: pods.len(),
        pods,
    }))
}

pub async fn handle_cluster_metrics(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClusterMetrics>, ApiError> {
    let handle = lookup(&state, &name).await?;
    summary::cluster_metrics(&handle, &state.metrics)
        .await
        .map(Json)
        .map_err(|e| ApiError::query("Failed to get cluster metrics", e))
}

pub async fn handle_container_metrics(
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, ApiError> {
    state
        .metrics
        .container_metrics(Utc::now())
        .await
        .map(Json)
        .map_err(|e| ApiError::query("Failed to get container metrics", e))
}

/// `id` arrives percent-decoded, so cgroup paths stay intact.
pub async fn handle_single_container_metrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerMetric>, ApiError> {
    if id.is_empty() {
        return Err(ApiError::bad_request("Container id is required"));
    }
    state
        .metrics
        .single_container_metrics(&id, Utc::now())
        .await
        .map(Json)
        .map_err(|e| ApiError::query("Failed to get container metrics", e))
}

pub async fn handle_skipped_contexts(State(state): State<AppState>) -> Json<SkippedResponse> {
    let skipped = state.registry.skipped().await;
    Json(SkippedResponse {
        count: skipped.len(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    use crate::clients::kubeconfig::KubeconfigSource;
    use crate::clients::registry::ClusterRegistry;
    use crate::routes::build_router;
    use crate::services::metrics::ContainerMetricsService;
    use crate::testing::{
        FakeCluster, FakeConnector, FakeSeries, kubeconfig_yaml, node, pod, sample,
    };

    async fn serve(series: FakeSeries) -> String {
        let connector = FakeConnector::default()
            .with(
                "prod",
                FakeCluster::healthy("v1.29.0")
                    .with_nodes(vec![node("prod-1", Some("True"))])
                    .with_pods(vec![
                        pod("web-1", "default", "Running"),
                        pod("dns", "kube-system", "Running"),
                    ]),
            )
            .with("down", FakeCluster::unreachable());
        let source = KubeconfigSource::Inline(kubeconfig_yaml(&[
            ("prod", "prod"),
            ("down", "down"),
            ("legacy", "gone"),
        ]));
        let registry =
            ClusterRegistry::initialize(&source, Arc::new(connector), Duration::from_millis(200))
                .await
                .unwrap();
        let metrics = ContainerMetricsService::new(Arc::new(series), Duration::from_secs(1));
        let state = AppState {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state, &["*".to_string()]);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    async fn get(url: &str) -> (u16, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve(FakeSeries::default()).await;
        let (status, body) = get(&format!("{}/health", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "ClusterSight API");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_list_clusters_and_skipped() {
        let base = serve(FakeSeries::default()).await;

        let (status, body) = get(&format!("{}/clusters", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["count"], 2);
        assert_eq!(body["clusters"][0]["name"], "down");
        assert_eq!(body["clusters"][0]["status"], "disconnected");
        assert_eq!(body["clusters"][1]["name"], "prod");
        assert_eq!(body["clusters"][1]["status"], "connected");
        assert_eq!(body["clusters"][1]["version"], "v1.29.0");

        let (_, body) = get(&format!("{}/diagnostics/contexts", base)).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["skipped"][0]["name"], "legacy");
    }

    #[tokio::test]
    async fn test_cluster_nodes_status_codes() {
        let base = serve(FakeSeries::default()).await;

        let (status, body) = get(&format!("{}/clusters/prod/nodes", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["cluster"], "prod");
        assert_eq!(body["count"], 1);
        assert_eq!(body["nodes"][0]["status"], "Ready");

        let (status, body) = get(&format!("{}/clusters/staging/nodes", base)).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Cluster not found");

        let (status, body) = get(&format!("{}/clusters/%20/nodes", base)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Invalid request");

        let (status, body) = get(&format!("{}/clusters/down/nodes", base)).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "Failed to get nodes");
        assert!(body["message"].as_str().unwrap().contains("cluster down"));
    }

    #[tokio::test]
    async fn test_cluster_pods_namespace_filter() {
        let base = serve(FakeSeries::default()).await;

        let (_, body) = get(&format!("{}/clusters/prod/pods", base)).await;
        assert_eq!(body["count"], 2);

        let (_, body) = get(&format!("{}/clusters/prod/pods?namespace=kube-system", base)).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["pods"][0]["name"], "dns");
    }

    #[tokio::test]
    async fn test_cluster_metrics_card() {
        let base = serve(FakeSeries::default()).await;
        let (status, body) = get(&format!("{}/clusters/prod/metrics", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["cluster_name"], "prod");
        assert_eq!(body["nodes"]["ready"], 1);
        assert_eq!(body["pods"]["running"], 2);
    }

    #[tokio::test]
    async fn test_container_metrics_routes() {
        let series = FakeSeries::default()
            .ok("container_cpu_usage_seconds_total", vec![sample("/docker/abc", "web", 3.5)])
            .ok("container_memory_usage_bytes", vec![sample("/docker/abc", "web", 1024.0)]);
        let base = serve(series).await;

        let (status, body) = get(&format!("{}/metrics/containers", base)).await;
        assert_eq!(status, 200);
        assert!(body["timestamp"].is_string());
        assert_eq!(body["metrics"]["/docker/abc"]["cpu_usage_percent"], 3.5);
        assert_eq!(body["metrics"]["/docker/abc"]["memory_usage_bytes"], 1024.0);

        let (status, body) = get(&format!("{}/metrics/containers/%2Fdocker%2Fabc", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["container_id"], "/docker/abc");
        assert_eq!(body["container_name"], "web");
    }

    #[tokio::test]
    async fn test_metrics_backend_failure_is_500() {
        let series = FakeSeries::default()
            .failing("container_cpu_usage_seconds_total")
            .failing("container_memory_usage_bytes");
        let base = serve(series).await;

        let (status, body) = get(&format!("{}/metrics/containers", base)).await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "Failed to get container metrics");

        let (status, _) = get(&format!("{}/metrics/containers/abc", base)).await;
        assert_eq!(status, 500);
    }
}
