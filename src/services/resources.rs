use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, NodeAddress, NodeCondition, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::{BTreeMap, BTreeSet};

use crate::clients::NamespaceScope;
use crate::clients::registry::ClusterHandle;
use crate::error::QueryError;
use crate::helpers::{age_in_hours, age_in_minutes};
use crate::models::views::{NodeReadiness, NodeView, PodView};

pub const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

pub async fn list_nodes(handle: &ClusterHandle) -> Result<Vec<NodeView>, QueryError> {
    let nodes = handle
        .api()
        .list_nodes(None)
        .await
        .map_err(|e| QueryError::cluster(&handle.name, format!("failed to get nodes: {}", e)))?;

    let now = Utc::now();
    Ok(nodes.iter().map(|n| build_node_view(n, now)).collect())
}

pub async fn list_pods(
    handle: &ClusterHandle,
    scope: &NamespaceScope,
) -> Result<Vec<PodView>, QueryError> {
    let pods = handle
        .api()
        .list_pods(scope)
        .await
        .map_err(|e| QueryError::cluster(&handle.name, format!("failed to get pods: {}", e)))?;

    let now = Utc::now();
    Ok(pods.iter().map(|p| build_pod_view(p, now)).collect())
}

/// Round-trips through the RFC 3339 wire form.
pub fn creation_time(t: Option<&Time>) -> Option<DateTime<Utc>> {
    let value = serde_json::to_value(t?).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.into_iter()
        .flatten()
        .map(|(k, q)| (k.clone(), q.0.clone()))
        .collect()
}

// --- View Builders ---

pub fn build_node_view(node: &Node, now: DateTime<Utc>) -> NodeView {
    let status = node.status.as_ref();
    let (internal_ip, external_ip) =
        node_ips(status.and_then(|s| s.addresses.as_deref()).unwrap_or_default());
    let empty = BTreeMap::new();

    NodeView {
        name: node.metadata.name.clone().unwrap_or_default(),
        status: node_readiness(status.and_then(|s| s.conditions.as_deref()).unwrap_or_default()),
        roles: node_roles(node.metadata.labels.as_ref().unwrap_or(&empty)),
        age: age_in_hours(creation_time(node.metadata.creation_timestamp.as_ref()), now),
        version: status
            .and_then(|s| s.node_info.as_ref())
            .map(|i| i.kubelet_version.clone())
            .unwrap_or_default(),
        internal_ip,
        external_ip,
        capacity: quantities(status.and_then(|s| s.capacity.as_ref())),
        allocatable: quantities(status.and_then(|s| s.allocatable.as_ref())),
    }
}

/// Role names from `node-role.kubernetes.io/<role>` labels. A bare prefix
/// means `master`; a node with no role labels is a `worker`.
pub fn node_roles(labels: &BTreeMap<String, String>) -> Vec<String> {
    let roles: BTreeSet<String> = labels
        .keys()
        .filter_map(|k| k.strip_prefix(ROLE_LABEL_PREFIX))
        .map(|role| {
            if role.is_empty() {
                "master".to_string()
            } else {
                role.to_string()
            }
        })
        .collect();

    if roles.is_empty() {
        vec!["worker".to_string()]
    } else {
        roles.into_iter().collect()
    }
}

pub fn node_readiness(conditions: &[NodeCondition]) -> NodeReadiness {
    match conditions.iter().find(|c| c.type_ == "Ready") {
        Some(c) if c.status == "True" => NodeReadiness::Ready,
        Some(_) => NodeReadiness::NotReady,
        None => NodeReadiness::Unknown,
    }
}

/// First `InternalIP` and first `ExternalIP`; empty when absent.
pub fn node_ips(addresses: &[NodeAddress]) -> (String, String) {
    let mut internal: Option<&str> = None;
    let mut external: Option<&str> = None;
    for addr in addresses {
        match addr.type_.as_str() {
            "InternalIP" if internal.is_none() => internal = Some(&addr.address),
            "ExternalIP" if external.is_none() => external = Some(&addr.address),
            _ => {}
        }
    }
    (
        internal.unwrap_or_default().to_string(),
        external.unwrap_or_default().to_string(),
    )
}

pub fn build_pod_view(pod: &Pod, now: DateTime<Utc>) -> PodView {
    let spec = pod.spec.as_ref();
    let status = pod.status.as_ref();
    let statuses = status
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default();
    let ready = statuses.iter().filter(|cs| cs.ready).count();
    let restarts = statuses.iter().map(|cs| cs.restart_count).sum();
    let created_at = creation_time(pod.metadata.creation_timestamp.as_ref());

    PodView {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        status: status.and_then(|s| s.phase.clone()).unwrap_or_default(),
        node: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
        age: age_in_minutes(created_at, now),
        ready: format!("{}/{}", ready, spec.map_or(0, |s| s.containers.len())),
        restarts,
        created_at,
    }
}
