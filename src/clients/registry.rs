use async_trait::async_trait;
use futures_util::future::join_all;
use kube::config::{Kubeconfig, KubeconfigError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, NotFoundError};
use crate::models::views::{ClusterStatus, ClusterSummary, SkippedContext};

use super::kubeconfig::{KubeconfigSource, client_config, context_names};
use super::{ClusterApi, KubeClient};

/// Why a kubeconfig context did not become a cluster handle.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),

    #[error("building client: {0}")]
    Client(#[from] kube::Error),
}

/// A live connection to one cluster context.
pub struct ClusterHandle {
    pub name: String,
    api: Arc<dyn ClusterApi>,
}

impl ClusterHandle {
    pub fn new(name: impl Into<String>, api: Arc<dyn ClusterApi>) -> Self {
        Self {
            name: name.into(),
            api,
        }
    }

    pub fn api(&self) -> &dyn ClusterApi {
        self.api.as_ref()
    }
}

/// Turns a kubeconfig context into a client.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        context: &str,
        kubeconfig: &Kubeconfig,
    ) -> Result<Arc<dyn ClusterApi>, ContextError>;
}

pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        context: &str,
        kubeconfig: &Kubeconfig,
    ) -> Result<Arc<dyn ClusterApi>, ContextError> {
        let config = client_config(kubeconfig, context).await?;
        Ok(Arc::new(KubeClient::new(config, self.timeout)?))
    }
}

#[derive(Default)]
struct Snapshot {
    handles: HashMap<String, Arc<ClusterHandle>>,
    skipped: Vec<SkippedContext>,
}

impl Snapshot {
    async fn build(kubeconfig: &Kubeconfig, connector: &dyn Connector) -> Self {
        let mut snapshot = Snapshot::default();
        for name in context_names(kubeconfig) {
            match connector.connect(&name, kubeconfig).await {
                Ok(api) => {
                    snapshot
                        .handles
                        .insert(name.clone(), Arc::new(ClusterHandle::new(name, api)));
                }
                Err(e) => {
                    warn!("skipping context {}: {}", name, e);
                    snapshot.skipped.push(SkippedContext {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        snapshot
    }
}

/// Owns one handle per usable kubeconfig context.
///
/// Readers take an `Arc` of the current snapshot, so a reload never changes
/// the handles an in-flight request is working with.
pub struct ClusterRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
    connector: Arc<dyn Connector>,
    probe_timeout: Duration,
}

impl ClusterRegistry {
    pub async fn initialize(
        source: &KubeconfigSource,
        connector: Arc<dyn Connector>,
        probe_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let kubeconfig = source.load()?;
        let snapshot = Snapshot::build(&kubeconfig, connector.as_ref()).await;
        info!(
            "cluster registry initialized with {} clusters ({} skipped)",
            snapshot.handles.len(),
            snapshot.skipped.len()
        );

        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            connector,
            probe_timeout,
        })
    }

    /// Rebuilds every handle from `source` and swaps the result in.
    /// On error the current snapshot stays in place.
    pub async fn reload(&self, source: &KubeconfigSource) -> Result<usize, ConfigError> {
        let kubeconfig = source.load()?;
        let fresh = Arc::new(Snapshot::build(&kubeconfig, self.connector.as_ref()).await);
        let count = fresh.handles.len();
        *self.snapshot.write().await = fresh;
        Ok(count)
    }

    pub async fn list_clusters(&self) -> Vec<ClusterSummary> {
        let snapshot = self.snapshot().await;
        let probes = snapshot
            .handles
            .values()
            .map(|h| probe(h.clone(), self.probe_timeout));

        let mut summaries = join_all(probes).await;
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub async fn get_handle(&self, name: &str) -> Result<Arc<ClusterHandle>, NotFoundError> {
        self.snapshot()
            .await
            .handles
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError(name.to_string()))
    }

    pub async fn skipped(&self) -> Vec<SkippedContext> {
        self.snapshot().await.skipped.clone()
    }

    pub async fn run_reloader(
        self: Arc<Self>,
        source: KubeconfigSource,
        every: Duration,
        mut shutdown: tokio::sync::watch::Receiver<()>,
    ) {
        let mut interval = time::interval(every);
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reload(&source).await {
                        Ok(n) => debug!("reloaded kubeconfig, {} clusters", n),
                        Err(e) => {
                            warn!("kubeconfig reload failed, keeping previous clusters: {}", e)
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("kubeconfig reloader shutting down");
                    return;
                }
            }
        }
    }

    async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }
}

async fn probe(handle: Arc<ClusterHandle>, timeout: Duration) -> ClusterSummary {
    let checks = async {
        let version = match handle.api().probe_version().await {
            Ok(v) if !v.is_empty() => v,
            Ok(_) => "unknown".to_string(),
            Err(e) => {
                debug!("version probe failed for {}: {}", handle.name, e);
                "unknown".to_string()
            }
        };
        let status = match handle.api().list_nodes(Some(1)).await {
            Ok(_) => ClusterStatus::Connected,
            Err(e) => {
                warn!("cluster {} unreachable: {}", handle.name, e);
                ClusterStatus::Disconnected
            }
        };
        (status, version)
    };

    let (status, version) = match time::timeout(timeout, checks).await {
        Ok(result) => result,
        Err(_) => {
            warn!("probe of cluster {} timed out after {:?}", handle.name, timeout);
            (ClusterStatus::Unknown, "unknown".to_string())
        }
    };

    ClusterSummary {
        name: handle.name.clone(),
        status,
        version,
    }
}
