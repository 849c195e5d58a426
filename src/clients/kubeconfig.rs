use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use std::path::PathBuf;
use tracing::warn;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub enum KubeconfigSource {
    /// Merged in order; the first file to define a name wins. Missing
    /// entries are skipped as long as one file remains.
    Files(Vec<PathBuf>),
    Inline(String),
}

impl KubeconfigSource {
    pub fn load(&self) -> Result<Kubeconfig, ConfigError> {
        match self {
            KubeconfigSource::Inline(doc) => {
                Kubeconfig::from_yaml(doc).map_err(|e| ConfigError::Kubeconfig {
                    origin: "inline kubeconfig".to_string(),
                    source: e,
                })
            }
            KubeconfigSource::Files(paths) => load_files(paths),
        }
    }
}

fn load_files(paths: &[PathBuf]) -> Result<Kubeconfig, ConfigError> {
    let mut merged: Option<Kubeconfig> = None;
    for path in paths {
        if !path.exists() {
            warn!("kubeconfig {} does not exist, skipping", path.display());
            continue;
        }
        let origin = || path.display().to_string();
        let next = Kubeconfig::read_from(path).map_err(|e| ConfigError::Kubeconfig {
            origin: origin(),
            source: e,
        })?;
        merged = Some(match merged {
            None => next,
            Some(current) => current.merge(next).map_err(|e| ConfigError::Kubeconfig {
                origin: origin(),
                source: e,
            })?,
        });
    }

    merged.ok_or_else(|| {
        let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        ConfigError::NoReadableKubeconfig(listed.join(", "))
    })
}

pub fn context_names(kubeconfig: &Kubeconfig) -> Vec<String> {
    kubeconfig.contexts.iter().map(|c| c.name.clone()).collect()
}

/// Client configuration for one named context. Exec plugins and auth
/// providers are carried through and run when the client first authenticates.
pub async fn client_config(
    kubeconfig: &Kubeconfig,
    context: &str,
) -> Result<kube::Config, KubeconfigError> {
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    kube::Config::from_custom_kubeconfig(kubeconfig.clone(), &options).await
}
