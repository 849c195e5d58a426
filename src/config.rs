use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::clients::kubeconfig::KubeconfigSource;
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Kubeconfig files merged in order. Empty means `~/.kube/config`.
    #[serde(default)]
    pub kubeconfig: Vec<PathBuf>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    /// 0 disables the background reload loop.
    #[serde(default)]
    pub reload_interval_secs: u64,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_url")]
    pub base_url: String,
    #[serde(default = "default_metrics_timeout")]
    pub timeout_secs: u64,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_api_timeout() -> u64 {
    10
}

fn default_metrics_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_metrics_timeout() -> u64 {
    10
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            base_url: default_metrics_url(),
            timeout_secs: default_metrics_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            kubeconfig: Vec::new(),
            probe_timeout_secs: default_probe_timeout(),
            api_timeout_secs: default_api_timeout(),
            reload_interval_secs: 0,
            metrics: MetricsConfig::default(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Config {
    /// Reads `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&data, &path.display().to_string())
    }

    fn parse(data: &str, origin: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(data).map_err(|e| ConfigError::Parse {
            origin: origin.to_string(),
            source: e,
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.listen_port = port
                .trim()
                .parse()
                .map_err(|_| {
                    ConfigError::Invalid(format!("PORT {:?} is not a port number", port))
                })?;
        }
        if let Some(paths) = lookup("KUBECONFIG") {
            let paths: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !paths.is_empty() {
                self.kubeconfig = paths;
            }
        }
        if let Some(url) = lookup("PROMETHEUS_URL") {
            self.metrics.base_url = url;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("probe_timeout_secs must be positive".to_string()));
        }
        if self.api_timeout_secs == 0 || self.metrics.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    pub fn kubeconfig_source(&self) -> Result<KubeconfigSource, ConfigError> {
        if !self.kubeconfig.is_empty() {
            return Ok(KubeconfigSource::Files(self.kubeconfig.clone()));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoKubeconfig)?;
        Ok(KubeconfigSource::Files(vec![home.join(".kube").join("config")]))
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics.timeout_secs)
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }
}
