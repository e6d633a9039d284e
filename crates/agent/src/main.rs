//! Allocation Agent - cluster resource allocation exporter
//!
//! Runs as a single-replica Deployment, periodically aggregating the CPU
//! and memory requested on the cluster's nodes and exporting the result
//! as Prometheus gauges.

use allocation_lib::{
    collector::{CollectionLoopBuilder, KubeSource},
    health::{components, HealthRegistry},
    observability::{PrometheusPublisher, StructuredLogger},
    SnapshotBuilder,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting allocation-agent");

    let config = config::AgentConfig::load()?;
    info!(
        cluster = %config.cluster_name,
        label_selector = %config.label_selector,
        reporting_delay_secs = config.reporting_delay_secs,
        reporting_timeout_secs = config.reporting_timeout_secs,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::KUBE_API).await;

    let logger = StructuredLogger::new(&config.cluster_name);

    let source = KubeSource::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let publisher = PrometheusPublisher::new(&config.metric_prefix, &config.cluster_name)
        .context("failed to register allocation gauges")?;

    let collection_loop = CollectionLoopBuilder::new()
        .snapshot_builder(SnapshotBuilder::new(
            Arc::new(source),
            config.snapshot_options(),
        ))
        .sink(Arc::new(publisher))
        .health_registry(health_registry.clone())
        .logger(logger.clone())
        .delay(config.reporting_delay())
        .timeout(config.reporting_timeout())
        .projection(config.projection())
        .build()?;

    logger.log_startup(
        AGENT_VERSION,
        config.reporting_delay_secs,
        &config.label_selector,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let collector_handle = tokio::spawn(collection_loop.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(
        config.cluster_name.clone(),
        health_registry,
        config.stale_after(),
    ));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let reason = tokio::select! {
        reason = shutdown_signal() => reason?,
        result = api_handle => {
            match result {
                Ok(Ok(())) => "API server stopped",
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server task panicked"
                }
            }
        }
    };

    logger.log_shutdown(reason);
    // The receiver is gone if the loop already exited
    let _ = shutdown_tx.send(());
    collector_handle
        .await
        .context("collection loop task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                Ok("SIGINT received")
            }
            _ = sigterm.recv() => Ok("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        Ok("SIGINT received")
    }
}
