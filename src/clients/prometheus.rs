use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ClientError, ConfigError, QueryError};
use crate::models::metrics::{MetricKind, RawSample};

/// One series of an instant-vector result.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl Sample {
    /// Keys the sample by its `id` label, named by its `name` label.
    pub fn into_raw(self, kind: MetricKind) -> RawSample {
        let label = |k: &str| self.labels.get(k).map(String::as_str).unwrap_or_default();
        RawSample::new(kind, label("id"), label("name"), self.value)
    }
}

#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Evaluates `expression` as an instant query at `at`.
    async fn query(&self, expression: &str, at: DateTime<Utc>) -> Result<Vec<Sample>, QueryError>;
}

pub struct PrometheusClient {
    base_url: String,
    http: Client,
}

impl PrometheusClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "metrics base_url {:?} must start with http:// or https://",
                url
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("building metrics client: {}", e)))?;

        Ok(Self { base_url, http })
    }

    async fn instant_query(
        &self,
        expression: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<Sample>, ClientError> {
        let time = format!("{:.3}", at.timestamp_millis() as f64 / 1000.0);
        let resp = self
            .http
            .get(format!("{}/api/v1/query", self.base_url))
            .query(&[("query", expression), ("time", time.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                path: "/api/v1/query".to_string(),
                status,
                body,
            });
        }

        let body: QueryResponse = resp.json().await?;
        if body.status != "success" {
            return Err(ClientError::Api(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        match body.data {
            Some(data) => data.into_samples(),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl TimeSeriesSource for PrometheusClient {
    async fn query(&self, expression: &str, at: DateTime<Utc>) -> Result<Vec<Sample>, QueryError> {
        self.instant_query(expression, at)
            .await
            .map_err(|e| QueryError::Metrics(format!("{}: {}", expression, e)))
    }
}

// --- API response types ---

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<QueryData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VectorEntry {
    #[serde(default)]
    metric: HashMap<String, String>,
    value: (f64, String),
}

impl QueryData {
    // Scalars, strings and matrices carry no per-entity labels.
    fn into_samples(self) -> Result<Vec<Sample>, ClientError> {
        if self.result_type != "vector" {
            return Ok(Vec::new());
        }
        let entries: Vec<VectorEntry> = serde_json::from_value(self.result)?;
        entries
            .into_iter()
            .map(|e| {
                let value = e.value.1.parse::<f64>().map_err(|_| {
                    ClientError::Api(format!("sample value {:?} is not a number", e.value.1))
                })?;
                Ok(Sample {
                    labels: e.metric,
                    value,
                })
            })
            .collect()
    }
}
