//! Cluster state collection
//!
//! This module provides the `ClusterSource` seam the engine lists nodes and
//! pods through, its Kubernetes implementation, label selector validation,
//! quantity parsing, and the periodic collection loop.

mod kube_source;
mod r#loop;
mod quantity;
mod selector;

pub use kube_source::{active_pods_field_selector, node_is_ready, KubeSource};
pub use quantity::{parse_count, parse_cpu_millis, parse_memory_bytes};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, CycleReport};
pub use selector::{LabelSelector, Requirement};

use crate::error::CollectError;
use crate::models::{NodeInfo, PodInfo};
use async_trait::async_trait;

/// Trait for listing the cluster state a cycle aggregates
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// List nodes matching the selector, regardless of readiness
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<NodeInfo>, CollectError>;

    /// List the pods scheduled on a node that are not Succeeded or Failed
    async fn list_active_pods(&self, node_name: &str) -> Result<Vec<PodInfo>, CollectError>;
}
