use chrono::Utc;
use std::collections::HashMap;
use tracing::warn;

use crate::clients::NamespaceScope;
use crate::clients::registry::ClusterHandle;
use crate::error::QueryError;
use crate::helpers::{format_cores, human_bytes, parse_quantity};
use crate::models::metrics::ContainerMetric;
use crate::models::views::{
    ClusterMetrics, CpuMetrics, MemoryMetrics, NodeMetrics, NodeReadiness, NodeView, PodMetrics,
    PodView,
};

use super::metrics::ContainerMetricsService;
use super::resources;

pub fn summarize_nodes(nodes: &[NodeView]) -> NodeMetrics {
    NodeMetrics {
        total: nodes.len(),
        ready: nodes
            .iter()
            .filter(|n| n.status == NodeReadiness::Ready)
            .count(),
    }
}

/// Phases other than Running, Pending and Failed only count toward the total.
pub fn summarize_pods(pods: &[PodView]) -> PodMetrics {
    let mut m = PodMetrics {
        total: pods.len(),
        ..Default::default()
    };
    for pod in pods {
        match pod.status.as_str() {
            "Running" => m.running += 1,
            "Pending" => m.pending += 1,
            "Failed" => m.failed += 1,
            _ => {}
        }
    }
    m
}

fn capacity_total(nodes: &[NodeView], resource: &str) -> f64 {
    nodes
        .iter()
        .filter_map(|n| n.capacity.get(resource))
        .filter_map(|q| parse_quantity(q))
        .sum()
}

fn percent(used: f64, total: f64) -> f64 {
    if total > 0.0 { used / total * 100.0 } else { 0.0 }
}

/// Combines node capacity with container usage. `usage` is `None` when the
/// metrics backend could not be read, in which case used figures are zero.
pub fn resource_metrics(
    nodes: &[NodeView],
    usage: Option<&HashMap<String, ContainerMetric>>,
) -> (CpuMetrics, MemoryMetrics) {
    let total_cores = capacity_total(nodes, "cpu");
    let total_memory = capacity_total(nodes, "memory");

    let (used_cores, used_memory) = usage
        .map(|records| {
            records.values().fold((0.0, 0.0), |(cpu, mem), r| {
                (cpu + r.cpu_usage / 100.0, mem + r.memory_usage)
            })
        })
        .unwrap_or((0.0, 0.0));

    let cpu = CpuMetrics {
        total_cores: format_cores(total_cores),
        used_cores: format!("{:.1}", used_cores),
        usage_percent: format!("{:.1}", percent(used_cores, total_cores)),
    };
    let memory = MemoryMetrics {
        total_memory: human_bytes(total_memory),
        used_memory: human_bytes(used_memory),
        usage_percent: format!("{:.1}", percent(used_memory, total_memory)),
    };
    (cpu, memory)
}

pub fn build_cluster_metrics(
    cluster_name: &str,
    nodes: &[NodeView],
    pods: &[PodView],
    usage: Option<&HashMap<String, ContainerMetric>>,
) -> ClusterMetrics {
    let (cpu, memory) = resource_metrics(nodes, usage);
    ClusterMetrics {
        cluster_name: cluster_name.to_string(),
        nodes: summarize_nodes(nodes),
        pods: summarize_pods(pods),
        cpu,
        memory,
    }
}

/// Structural counts and resource usage for one cluster. The listing path
/// must succeed; the usage path degrades to zeros.
pub async fn cluster_metrics(
    handle: &ClusterHandle,
    metrics: &ContainerMetricsService,
) -> Result<ClusterMetrics, QueryError> {
    let structural = async {
        tokio::try_join!(
            resources::list_nodes(handle),
            resources::list_pods(handle, &NamespaceScope::All)
        )
    };
    let (structural, usage) = tokio::join!(structural, metrics.container_metrics(Utc::now()));
    let (nodes, pods) = structural?;

    let usage = match usage {
        Ok(resp) => Some(resp.metrics),
        Err(e) => {
            warn!("resource usage unavailable for cluster {}: {}", handle.name, e);
            None
        }
    };

    Ok(build_cluster_metrics(&handle.name, &nodes, &pods, usage.as_ref()))
}
