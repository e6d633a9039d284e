//! Cluster snapshot assembly
//!
//! Runs one cycle: validate the selector, list nodes, keep the eligible
//! ones, list each node's active pods, extract records and fold them. Any
//! failure aborts the cycle and nothing is returned.

use super::aggregate::{groups_of, total_of};
use super::extract::extract_node;
use crate::collector::{ClusterSource, LabelSelector};
use crate::error::CollectError;
use crate::models::{ClusterSnapshot, NodeRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// What a cycle collects and which parts of the snapshot it keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Label selector restricting the listed nodes; empty means all
    pub label_selector: String,
    /// Count nodes regardless of their Ready condition
    pub ignore_node_readiness: bool,
    /// Keep per (role, instance type) rollups
    pub compute_group_totals: bool,
    /// Keep one record per node
    pub include_node_details: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            label_selector: String::new(),
            ignore_node_readiness: false,
            compute_group_totals: true,
            include_node_details: false,
        }
    }
}

/// Builds a fresh `ClusterSnapshot` per call
#[derive(Clone)]
pub struct SnapshotBuilder {
    source: Arc<dyn ClusterSource>,
    options: SnapshotOptions,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn ClusterSource>, options: SnapshotOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    /// Run one collection cycle
    pub async fn build(&self) -> Result<ClusterSnapshot, CollectError> {
        let selector = LabelSelector::parse(&self.options.label_selector)?;

        let nodes = self.source.list_nodes(&selector).await?;
        let listed = nodes.len();

        let mut records = Vec::with_capacity(listed);
        for node in nodes
            .iter()
            .filter(|node| self.options.ignore_node_readiness || node.ready)
        {
            let pods = self.source.list_active_pods(&node.name).await?;
            records.push(extract_node(node, &pods)?);
        }

        debug!(
            listed,
            eligible = records.len(),
            ignore_readiness = self.options.ignore_node_readiness,
            "Extracted node allocations"
        );

        let snapshot = assemble(records, &self.options, Utc::now())?;
        info!(
            nodes = snapshot.totals().node_count,
            groups = snapshot.groups().map_or(0, |g| g.len()),
            cpu_requests_pct = snapshot.totals().allocation.cpu_requests_pct(),
            memory_requests_pct = snapshot.totals().allocation.memory_requests_pct(),
            "Built cluster snapshot"
        );
        Ok(snapshot)
    }
}

/// Package node records into a snapshot according to the options
pub fn assemble(
    records: Vec<NodeRecord>,
    options: &SnapshotOptions,
    collected_at: DateTime<Utc>,
) -> Result<ClusterSnapshot, CollectError> {
    let totals = total_of(&records)?;
    let groups = if options.compute_group_totals {
        Some(groups_of(&records)?)
    } else {
        None
    };
    let nodes = options.include_node_details.then_some(records);

    Ok(ClusterSnapshot::new(collected_at, totals, groups, nodes))
}
