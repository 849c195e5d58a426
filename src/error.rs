use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;

use crate::models::views::ErrorResponse;

/// Fatal configuration problems. These stop the process at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("loading kubeconfig {origin}: {source}")]
    Kubeconfig {
        origin: String,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("no kubeconfig path configured and no home directory found")]
    NoKubeconfig,

    #[error("none of the kubeconfig files could be read: {0}")]
    NoReadableKubeconfig(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("cluster {0:?} not found")]
pub struct NotFoundError(pub String);

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("cluster {cluster}: {message}")]
    Cluster { cluster: String, message: String },

    #[error("metrics query failed: {0}")]
    Metrics(String),
}

impl QueryError {
    pub fn cluster(cluster: &str, err: impl std::fmt::Display) -> Self {
        QueryError::Cluster {
            cluster: cluster.to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors raised by the HTTP adapters before they are attributed to a cluster
/// or to the metrics backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Kube(#[from] kube::Error),

    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("GET {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    Api(String),
}

/// Route-level error rendered as `{error, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request",
            message: message.into(),
        }
    }

    pub fn not_found(err: NotFoundError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "Cluster not found",
            message: err.to_string(),
        }
    }

    pub fn query(error: &'static str, err: QueryError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.error.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
