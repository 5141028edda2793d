use anyhow::{Context, Result};
use kubert::config::KubertConfig;
use kubert::controller::{KubeDeployments, ReconciliationController};
use kubert::metrics;
use kubert::registry::{DockerHubClient, RegistryCredentials, TagResolver};
use kubert::resolver::ImageResolver;
use kubert::scheduler::Scheduler;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "kubert=info,kube=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Kubert - image tag reconciler");

    let config = KubertConfig::from_env().context("Invalid configuration")?;

    let metrics_handle = if config.metrics.enabled {
        Some(metrics::start_metrics_server(&config.metrics.addr).await?)
    } else {
        info!("Metrics server disabled via KUBERT_METRICS_ENABLED=false");
        None
    };

    let credentials = match (&config.registry.credentials, &config.registry.docker_config) {
        (Some(creds), _) => Some(creds.clone()),
        (None, Some(path)) => RegistryCredentials::from_docker_config_file(path)?,
        (None, None) => None,
    };
    if credentials.is_none() {
        info!("No registry credentials configured, querying anonymously");
    }

    let registry = DockerHubClient::new(
        config.registry.base_url.clone(),
        config.registry.page_size,
        credentials,
    )?;
    let resolver = ImageResolver::new(TagResolver::new(Arc::new(registry)));

    // Without a cluster client there is nothing to reconcile
    let workloads = KubeDeployments::try_default().await?;
    let controller = ReconciliationController::new(Arc::new(workloads), resolver);

    let scheduler = Scheduler::new(controller, config.targets.clone(), config.poll_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing current tick");
        if shutdown_tx.send(true).is_err() {
            warn!("Scheduler already stopped");
        }
    });

    info!("Kubert is running");
    scheduler.run(shutdown_rx).await;

    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    Ok(())
}

/// Resolves on SIGTERM or Ctrl+C. If no signal can be listened for, never resolves.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    Ok(()) = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
                return;
            },
            Err(e) => error!("Failed to listen for SIGTERM: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        },
    }
}
