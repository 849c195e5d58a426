use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Connected,
    Disconnected,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub name: String,
    pub status: ClusterStatus,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedContext {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeReadiness {
    Ready,
    NotReady,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub name: String,
    pub status: NodeReadiness,
    pub roles: Vec<String>,
    pub age: String,
    pub version: String,
    pub internal_ip: String,
    pub external_ip: String,
    pub capacity: BTreeMap<String, String>,
    pub allocatable: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PodView {
    pub name: String,
    pub namespace: String,
    pub status: String,
    pub node: String,
    pub age: String,
    pub ready: String,
    pub restarts: i32,
    pub created_at: Option<DateTime<Utc>>,
}

// --- Rollups ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeMetrics {
    pub total: usize,
    pub ready: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PodMetrics {
    pub total: usize,
    pub running: usize,
    pub pending: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CpuMetrics {
    pub total_cores: String,
    pub used_cores: String,
    pub usage_percent: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryMetrics {
    pub total_memory: String,
    pub used_memory: String,
    pub usage_percent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterMetrics {
    pub cluster_name: String,
    pub nodes: NodeMetrics,
    pub pods: PodMetrics,
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
