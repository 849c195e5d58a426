//! Fakes and fixtures shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerStatus, Node, NodeCondition, NodeStatus, NodeSystemInfo, Pod, PodSpec,
    PodStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::config::Kubeconfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clients::kubeconfig::client_config;
use crate::clients::prometheus::{Sample, TimeSeriesSource};
use crate::clients::registry::{Connector, ContextError};
use crate::clients::{ClusterApi, NamespaceScope};
use crate::error::{ClientError, QueryError};

fn refused(path: &str) -> ClientError {
    ClientError::Status {
        path: path.to_string(),
        status: 503,
        body: "connection refused".to_string(),
    }
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    version: Option<String>,
    reachable: bool,
    hang: bool,
}

impl FakeCluster {
    pub fn healthy(version: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            reachable: true,
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_pods(mut self, pods: Vec<Pod>) -> Self {
        self.pods = pods;
        self
    }

    async fn gate(&self, path: &str) -> Result<(), ClientError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.reachable { Ok(()) } else { Err(refused(path)) }
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_nodes(&self, limit: Option<u32>) -> Result<Vec<Node>, ClientError> {
        self.gate("/api/v1/nodes").await?;
        let mut nodes = self.nodes.clone();
        if let Some(n) = limit {
            nodes.truncate(n as usize);
        }
        Ok(nodes)
    }

    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<Pod>, ClientError> {
        self.gate("/api/v1/pods").await?;
        Ok(self
            .pods
            .iter()
            .filter(|p| match scope {
                NamespaceScope::All => true,
                NamespaceScope::Namespace(ns) => p.metadata.namespace.as_ref() == Some(ns),
            })
            .cloned()
            .collect())
    }

    async fn probe_version(&self) -> Result<String, ClientError> {
        self.gate("/version").await?;
        self.version.clone().ok_or_else(|| refused("/version"))
    }
}

/// Resolves contexts against the kubeconfig, then hands out registered fakes.
#[derive(Default)]
pub struct FakeConnector {
    clusters: HashMap<String, Arc<FakeCluster>>,
}

impl FakeConnector {
    pub fn with(mut self, context: &str, cluster: FakeCluster) -> Self {
        self.clusters.insert(context.to_string(), Arc::new(cluster));
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        context: &str,
        kubeconfig: &Kubeconfig,
    ) -> Result<Arc<dyn ClusterApi>, ContextError> {
        client_config(kubeconfig, context).await?;
        let cluster = self
            .clusters
            .get(context)
            .unwrap_or_else(|| panic!("no fake registered for context {}", context));
        Ok(cluster.clone() as Arc<dyn ClusterApi>)
    }
}

/// Builds a kubeconfig from `(context, cluster)` pairs. A cluster entry is
/// only defined when its name equals the context name, so pairs that differ
/// produce contexts that fail to resolve.
pub fn kubeconfig_yaml(contexts: &[(&str, &str)]) -> String {
    let mut clusters = String::from("clusters:\n");
    let mut ctxs = String::from("contexts:\n");
    for (context, cluster) in contexts {
        if context == cluster {
            clusters.push_str(&format!(
                "- name: {0}\n  cluster:\n    server: https://{0}.example.com\n",
                cluster
            ));
        }
        ctxs.push_str(&format!(
            "- name: {}\n  context:\n    cluster: {}\n    user: viewer\n",
            context, cluster
        ));
    }
    let users = "users:\n- name: viewer\n  user:\n    token: t0ken\n";
    format!("{}{}{}", clusters, users, ctxs)
}

pub fn time(at: DateTime<Utc>) -> Time {
    let wire = serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true));
    serde_json::from_value(wire).unwrap()
}

pub fn node(name: &str, ready: Option<&str>) -> Node {
    let condition = |type_: &str, status: &str| NodeCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        ..Default::default()
    };
    let conditions =
        ready.map(|status| vec![condition("MemoryPressure", "False"), condition("Ready", status)]);

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn set_capacity(node: &mut Node, resource: &str, quantity: &str) {
    node.status
        .get_or_insert_with(Default::default)
        .capacity
        .get_or_insert_with(Default::default)
        .insert(resource.to_string(), Quantity(quantity.to_string()));
}

pub fn set_kubelet_version(node: &mut Node, version: &str) {
    node.status.get_or_insert_with(Default::default).node_info = Some(NodeSystemInfo {
        kubelet_version: version.to_string(),
        ..Default::default()
    });
}

pub fn pod(name: &str, namespace: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec::default()),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

/// A pod whose containers report the given `(ready, restarts)` pairs.
pub fn pod_with_containers(
    name: &str,
    containers: &[(bool, i32)],
    created: Option<DateTime<Utc>>,
) -> Pod {
    let mut p = pod(name, "default", "Running");
    p.metadata.creation_timestamp = created.map(time);
    let mut specs = Vec::new();
    let mut statuses = Vec::new();
    for (i, (ready, restarts)) in containers.iter().enumerate() {
        specs.push(Container {
            name: format!("c{}", i),
            image: Some("busybox".to_string()),
            ..Default::default()
        });
        statuses.push(ContainerStatus {
            name: format!("c{}", i),
            ready: *ready,
            restart_count: *restarts,
            image: "busybox".to_string(),
            ..Default::default()
        });
    }
    p.spec = Some(PodSpec {
        containers: specs,
        ..Default::default()
    });
    if let Some(status) = p.status.as_mut() {
        status.container_statuses = Some(statuses);
    }
    p
}

pub fn sample(id: &str, name: &str, value: f64) -> Sample {
    let mut labels = HashMap::from([("id".to_string(), id.to_string())]);
    if !name.is_empty() {
        labels.insert("name".to_string(), name.to_string());
    }
    Sample { labels, value }
}

enum Reply {
    Samples(Vec<Sample>),
    Fail(String),
    Hang,
}

/// Answers queries by the metric name appearing in the expression.
#[derive(Default)]
pub struct FakeSeries {
    responses: HashMap<&'static str, Reply>,
    seen: Mutex<Vec<String>>,
}

impl FakeSeries {
    pub fn ok(mut self, metric: &'static str, samples: Vec<Sample>) -> Self {
        self.responses.insert(metric, Reply::Samples(samples));
        self
    }

    pub fn failing(mut self, metric: &'static str) -> Self {
        self.responses
            .insert(metric, Reply::Fail(format!("{}: connection reset", metric)));
        self
    }

    /// Queries for `metric` never complete.
    pub fn hanging(mut self, metric: &'static str) -> Self {
        self.responses.insert(metric, Reply::Hang);
        self
    }

    pub fn expressions(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeSeriesSource for FakeSeries {
    async fn query(
        &self,
        expression: &str,
        _at: DateTime<Utc>,
    ) -> Result<Vec<Sample>, QueryError> {
        self.seen.lock().unwrap().push(expression.to_string());
        match self.responses.iter().find(|(metric, _)| expression.contains(*metric)) {
            Some((_, Reply::Samples(samples))) => Ok(samples.clone()),
            Some((_, Reply::Fail(e))) => Err(QueryError::Metrics(e.clone())),
            Some((_, Reply::Hang)) => std::future::pending().await,
            None => Ok(Vec::new()),
        }
    }
}
