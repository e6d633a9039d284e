//! HTTP surface of the agent: liveness, snapshot readiness, and the
//! Prometheus exposition of the allocation gauges

use allocation_lib::health::{ComponentStatus, HealthRegistry};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// State shared by the handlers
#[derive(Clone)]
pub struct AppState {
    pub cluster_name: String,
    pub health_registry: HealthRegistry,
    /// Age after which the last exported snapshot is reported as stale
    pub stale_after: Duration,
}

impl AppState {
    pub fn new(
        cluster_name: impl Into<String>,
        health_registry: HealthRegistry,
        stale_after: Duration,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            health_registry,
            stale_after,
        }
    }
}

/// Body of `/readyz`
#[derive(Debug, Serialize)]
pub struct SnapshotReadiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cluster: String,
    /// Unix time of the last cycle whose samples are being exported
    pub last_success_timestamp: Option<i64>,
    pub last_success_age_secs: Option<i64>,
    /// The exported samples are older than the configured bound
    pub stale: bool,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
    };

    (status_code, Json(health))
}

/// Ready once a cycle succeeded; the body says which snapshot is served
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let last_success = state.health_registry.health().await.last_success_timestamp;

    let age = last_success.map(|ts| (Utc::now().timestamp() - ts).max(0));
    let stale_after = i64::try_from(state.stale_after.as_secs()).unwrap_or(i64::MAX);
    let body = SnapshotReadiness {
        ready: readiness.ready,
        reason: readiness.reason,
        cluster: state.cluster_name.clone(),
        last_success_timestamp: last_success,
        last_success_age_secs: age,
        stale: age.is_some_and(|age| age > stale_after),
    };

    let status_code = if body.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(body))
}

async fn metrics() -> impl IntoResponse {
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], buffer),
        Err(e) => {
            error!(error = %e, "Failed to encode allocation gauges");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                e.to_string().into_bytes(),
            )
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the API port and serve until the listener fails
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, cluster = %state.cluster_name, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
