//! Cluster allocation library
//!
//! This crate provides the core functionality for:
//! - Listing nodes and their active pods from Kubernetes
//! - Aggregating requests and limits per node, per group and cluster-wide
//! - Projecting snapshots into labeled gauge samples
//! - Health checks and observability

pub mod allocation;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;

pub use allocation::{ProjectionConfig, Sample, SnapshotBuilder, SnapshotOptions};
pub use collector::{ClusterSource, KubeSource, LabelSelector};
pub use error::{CollectError, QuantityError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, PrometheusPublisher, SampleSink, StructuredLogger};
