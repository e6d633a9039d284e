//! Health check infrastructure for the allocation agent
//!
//! Tracks the collector and Kubernetes API components and decides what the
//! liveness and readiness probes report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Last operation failed; a later cycle may recover
    Degraded,
    /// Component cannot work without operator action
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    /// Unix seconds of the last successful collection cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_timestamp: Option<i64>,
}

impl HealthResponse {
    /// Worst status across components; empty means healthy
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const COLLECTOR: &str = "collector";
    pub const KUBE_API: &str = "kube_api";
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    last_success: Arc<RwLock<Option<i64>>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            last_success: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Remember when the last cycle completed
    pub async fn record_cycle_success(&self, timestamp: i64) {
        *self.last_success.write().await = Some(timestamp);
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse {
            status,
            components,
            last_success_timestamp: *self.last_success.read().await,
        }
    }

    /// Get readiness response
    ///
    /// Ready once a cycle has succeeded. A degraded component keeps the
    /// agent ready because the last good samples are still being served.
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("No collection cycle has completed yet".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
        assert!(health.last_success_timestamp.is_none());
    }

    #[tokio::test]
    async fn test_health_registry_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::COLLECTOR].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_health_registry_degraded_status() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;
        registry.register(components::KUBE_API).await;

        registry
            .set_degraded(components::KUBE_API, "failed to list nodes")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::KUBE_API].message.as_deref(),
            Some("failed to list nodes")
        );
    }

    #[tokio::test]
    async fn test_health_registry_unhealthy_status() {
        let registry = HealthRegistry::new();
        registry.register(components::COLLECTOR).await;

        registry
            .set_unhealthy(components::COLLECTOR, "invalid label selector")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_survives_degraded_cycle() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry.record_cycle_success(1_700_000_000).await;
        registry
            .set_degraded(components::KUBE_API, "request timed out")
            .await;

        assert!(registry.readiness().await.ready);
        assert_eq!(
            registry.health().await.last_success_timestamp,
            Some(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;
        registry.set_unhealthy(components::COLLECTOR, "Failed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }
}
