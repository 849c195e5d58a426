mod clients;
mod config;
mod error;
mod helpers;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use clients::prometheus::PrometheusClient;
use clients::registry::{ClusterRegistry, HttpConnector};
use services::metrics::ContainerMetricsService;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClusterRegistry>,
    pub metrics: Arc<ContainerMetricsService>,
}

fn fatal(what: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", what, err);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("clustersight=info,tower_http=info")
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = args
        .windows(2)
        .find_map(|w| (w[0] == "-config" || w[0] == "--config").then(|| w[1].clone()))
        .or_else(|| args.first().filter(|a| !a.starts_with('-')).cloned())
        .map(PathBuf::from);

    let cfg = config::Config::load(config_path.as_deref())
        .unwrap_or_else(|e| fatal("error loading config", e));

    let source = cfg
        .kubeconfig_source()
        .unwrap_or_else(|e| fatal("error locating kubeconfig", e));
    let connector = Arc::new(HttpConnector::new(cfg.api_timeout()));
    let registry = ClusterRegistry::initialize(&source, connector, cfg.probe_timeout())
        .await
        .unwrap_or_else(|e| fatal("error loading kubeconfig", e));
    let registry = Arc::new(registry);

    let prometheus = PrometheusClient::new(&cfg.metrics.base_url, cfg.metrics_timeout())
        .unwrap_or_else(|e| fatal("error configuring metrics backend", e));
    let metrics = Arc::new(ContainerMetricsService::new(
        Arc::new(prometheus),
        cfg.metrics_timeout(),
    ));

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    if let Some(every) = cfg.reload_interval() {
        let reg = registry.clone();
        tokio::spawn(async move {
            reg.run_reloader(source, every, shutdown_rx).await;
        });
    }

    let state = AppState { registry, metrics };
    let router = routes::build_router(state, &cfg.cors_origins);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr)
        .await
        .unwrap_or_else(|e| fatal(&format!("failed to bind {}", listen_addr), e));

    info!("clustersight listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
        })
        .await
        .unwrap_or_else(|e| fatal("server error", e));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
