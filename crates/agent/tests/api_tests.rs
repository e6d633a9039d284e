//! Integration tests for the agent API endpoints

#[path = "../src/api.rs"]
mod api;

use allocation_lib::{
    allocation::{dimensions, MetricKind, Sample},
    health::{components, HealthRegistry},
    observability::{AgentMetrics, PrometheusPublisher, SampleSink},
};
use api::{create_router, serve, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::ServiceExt;

/// Gauges live in the process-wide registry, so register them once
fn publisher() -> &'static PrometheusPublisher {
    static PUBLISHER: OnceLock<PrometheusPublisher> = OnceLock::new();
    PUBLISHER.get_or_init(|| PrometheusPublisher::new("apitest", "test-cluster").unwrap())
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::KUBE_API).await;

    let state = Arc::new(AppState::new(
        "test-cluster",
        health_registry,
        Duration::from_secs(630),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["collector"].is_object());
    assert!(health["components"]["kube_api"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::KUBE_API, "failed to list nodes")
        .await;

    let (status, body) = get(app, "/healthz").await;
    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["kube_api"]["message"],
        "failed to list nodes"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::COLLECTOR, "invalid label selector")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["cluster"], "test-cluster");
    assert!(readiness["last_success_timestamp"].is_null());
    assert!(readiness["last_success_age_secs"].is_null());
    assert_eq!(readiness["stale"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_successful_cycle() {
    let (app, state) = setup_test_app().await;

    let collected_at = chrono::Utc::now().timestamp() - 10;
    state.health_registry.record_cycle_success(collected_at).await;
    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
    assert!(readiness.get("reason").is_none());
    assert_eq!(readiness["cluster"], "test-cluster");
    assert_eq!(readiness["last_success_timestamp"], collected_at);
    let age = readiness["last_success_age_secs"].as_i64().unwrap();
    assert!((10..600).contains(&age), "age {}", age);
    assert_eq!(readiness["stale"], false);
}

#[tokio::test]
async fn test_readyz_flags_stale_snapshot() {
    let (app, state) = setup_test_app().await;

    // Later cycles failed, so the exported snapshot is an hour old
    let collected_at = chrono::Utc::now().timestamp() - 3600;
    state.health_registry.record_cycle_success(collected_at).await;
    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_degraded(components::KUBE_API, "failed to list nodes")
        .await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["stale"], true);
    assert!(readiness["last_success_age_secs"].as_i64().unwrap() >= 3600);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::COLLECTOR, "Failed")
        .await;

    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let metrics = AgentMetrics::new();
    metrics.observe_cycle_latency(0.2);
    metrics.observe_cycle_latency(1.5);
    metrics.set_nodes_observed(3);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("allocation_agent_cycle_latency_seconds_bucket"));
    assert!(metrics_text.contains("allocation_agent_cycle_latency_seconds_count"));
    assert!(metrics_text.contains("allocation_agent_nodes_observed"));
}

#[tokio::test]
async fn test_metrics_exports_published_allocation_gauges() {
    let (app, _state) = setup_test_app().await;

    let dims: BTreeMap<String, String> = [
        (dimensions::INSTANCE_TYPE, "m5.2xlarge"),
        (dimensions::INSTANCE_SIZE, "2xlarge"),
        (dimensions::NODE_ROLE, "worker"),
        (dimensions::TENANT, ""),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    publisher().publish(
        &[Sample {
            metric_name: "apitest_cluster_node_count".to_string(),
            dimensions: dims,
            value: 4.0,
            kind: MetricKind::Gauge,
        }],
        chrono::Utc::now(),
    );

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let metrics_text = String::from_utf8(body).unwrap();
    assert!(metrics_text.contains("apitest_cluster_node_count{"));
    assert!(metrics_text.contains("cluster=\"test-cluster\""));
    assert!(metrics_text.contains("instance_size=\"2xlarge\""));
    assert!(metrics_text.contains("apitest_cluster_snapshot_timestamp_seconds"));
}

#[tokio::test]
async fn test_serve_keeps_running_on_ephemeral_port() {
    let (_app, state) = setup_test_app().await;

    let server = tokio::spawn(serve(0, state));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!server.is_finished());
    server.abort();
}
