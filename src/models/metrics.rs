use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Which field of a [`ContainerMetric`] a sample populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    CpuPercent,
    MemoryUsageBytes,
    MemoryLimitBytes,
    NetworkRxBytes,
    NetworkTxBytes,
}

/// One labeled value from an instant query, keyed for the join.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub kind: MetricKind,
}

impl RawSample {
    pub fn new(kind: MetricKind, id: &str, name: &str, value: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            value,
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerMetric {
    pub container_id: String,
    pub container_name: String,
    #[serde(rename = "cpu_usage_percent")]
    pub cpu_usage: f64,
    #[serde(rename = "memory_usage_bytes")]
    pub memory_usage: f64,
    #[serde(rename = "memory_limit_bytes")]
    pub memory_limit: f64,
    #[serde(rename = "network_rx_bytes")]
    pub network_rx: f64,
    #[serde(rename = "network_tx_bytes")]
    pub network_tx: f64,
}

impl ContainerMetric {
    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::CpuPercent => self.cpu_usage = value,
            MetricKind::MemoryUsageBytes => self.memory_usage = value,
            MetricKind::MemoryLimitBytes => self.memory_limit = value,
            MetricKind::NetworkRxBytes => self.network_rx = value,
            MetricKind::NetworkTxBytes => self.network_tx = value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub metrics: HashMap<String, ContainerMetric>,
}
