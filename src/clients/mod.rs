pub mod kubeconfig;
pub mod prometheus;
pub mod registry;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Client;
use kube::api::{Api, ListParams};
use std::time::Duration;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceScope {
    All,
    Namespace(String),
}

/// The read operations needed from one cluster's API server.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Lists nodes; `limit` caps the page size for cheap probes.
    async fn list_nodes(&self, limit: Option<u32>) -> Result<Vec<Node>, ClientError>;

    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<Pod>, ClientError>;

    /// Returns the server's git version string.
    async fn probe_version(&self) -> Result<String, ClientError>;
}

/// `ClusterApi` over a `kube::Client` for one context.
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(mut config: kube::Config, timeout: Duration) -> Result<Self, kube::Error> {
        config.connect_timeout = Some(timeout);
        config.read_timeout = Some(timeout);
        Ok(Self {
            client: Client::try_from(config)?,
        })
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn list_nodes(&self, limit: Option<u32>) -> Result<Vec<Node>, ClientError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let params = match limit {
            Some(n) => ListParams::default().limit(n),
            None => ListParams::default(),
        };
        Ok(nodes.list(&params).await?.items)
    }

    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<Pod>, ClientError> {
        let pods: Api<Pod> = match scope {
            NamespaceScope::All => Api::all(self.client.clone()),
            NamespaceScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
        };
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    async fn probe_version(&self) -> Result<String, ClientError> {
        Ok(self.client.apiserver_version().await?.git_version)
    }
}
