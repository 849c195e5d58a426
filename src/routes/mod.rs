pub mod api;

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::AppState;

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let v1 = Router::new()
        .route("/health", get(api::handle_health))
        // Clusters
        .route("/clusters", get(api::handle_list_clusters))
        .route("/clusters/{name}/nodes", get(api::handle_cluster_nodes))
        .route("/clusters/{name}/pods", get(api::handle_cluster_pods))
        .route("/clusters/{name}/metrics", get(api::handle_cluster_metrics))
        // Containers
        .route("/metrics/containers", get(api::handle_container_metrics))
        .route("/metrics/containers/{id}", get(api::handle_single_container_metrics))
        // Diagnostics
        .route("/diagnostics/contexts", get(api::handle_skipped_contexts));

    Router::new()
        .nest("/api/v1", v1)
        .layer(cors_layer(cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `"*"` anywhere in the list allows every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}
