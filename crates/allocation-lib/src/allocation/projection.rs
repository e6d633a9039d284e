//! Flattening a snapshot into labeled gauge samples

use super::role::DEFAULT_TENANT_LABEL;
use crate::error::CollectError;
use crate::models::{ClusterSnapshot, GroupRecord};
use serde::Serialize;
use std::collections::BTreeMap;

pub const METRIC_NODE_COUNT: &str = "cluster_node_count";
pub const METRIC_MEMORY_TOTAL: &str = "cluster_memory_total";
pub const METRIC_MEMORY_REQUESTS: &str = "cluster_memory_requests";
pub const METRIC_MEMORY_LIMITS: &str = "cluster_memory_limits";
pub const METRIC_CPU_TOTAL: &str = "cluster_cpu_total";
pub const METRIC_CPU_REQUESTS: &str = "cluster_cpu_requests";
pub const METRIC_CPU_LIMITS: &str = "cluster_cpu_limits";

/// Every metric emitted per group, in emission order
pub const GROUP_METRICS: [&str; 7] = [
    METRIC_NODE_COUNT,
    METRIC_MEMORY_TOTAL,
    METRIC_MEMORY_REQUESTS,
    METRIC_MEMORY_LIMITS,
    METRIC_CPU_TOTAL,
    METRIC_CPU_REQUESTS,
    METRIC_CPU_LIMITS,
];

/// Dimension names attached to every group sample
pub mod dimensions {
    pub const INSTANCE_TYPE: &str = "instance_type";
    pub const INSTANCE_SIZE: &str = "instance_size";
    pub const NODE_ROLE: &str = "node_role";
    pub const TENANT: &str = "tenant";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
}

/// One labeled numeric sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub metric_name: String,
    pub dimensions: BTreeMap<String, String>,
    pub value: f64,
    pub kind: MetricKind,
}

/// Naming used when projecting samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionConfig {
    /// Prepended to metric names as `<prefix>_`; empty for none
    pub metric_prefix: String,
    /// Node label the tenant dimension is read from
    pub tenant_label: String,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            metric_prefix: "paas".to_string(),
            tenant_label: DEFAULT_TENANT_LABEL.to_string(),
        }
    }
}

impl ProjectionConfig {
    pub fn metric_name(&self, metric: &str) -> String {
        if self.metric_prefix.is_empty() {
            metric.to_string()
        } else {
            format!("{}_{}", self.metric_prefix, metric)
        }
    }
}

/// Part of an instance type after the first `.`, or the whole string
pub fn instance_size_of(instance_type: &str) -> &str {
    instance_type
        .split_once('.')
        .map_or(instance_type, |(_, size)| size)
}

/// Seven gauges per group; no samples when groups were not computed
pub fn project(snapshot: &ClusterSnapshot, config: &ProjectionConfig) -> Vec<Sample> {
    snapshot
        .groups()
        .unwrap_or_default()
        .iter()
        .flat_map(|group| project_group(group, config))
        .collect()
}

/// Project a cycle outcome; a failed cycle yields no samples
pub fn project_cycle(
    outcome: &Result<ClusterSnapshot, CollectError>,
    config: &ProjectionConfig,
) -> Vec<Sample> {
    match outcome {
        Ok(snapshot) => project(snapshot, config),
        Err(_) => Vec::new(),
    }
}

fn project_group(group: &GroupRecord, config: &ProjectionConfig) -> Vec<Sample> {
    let instance_type = group.key.instance_type.as_str();
    let dims: BTreeMap<String, String> = [
        (dimensions::INSTANCE_TYPE, instance_type),
        (dimensions::INSTANCE_SIZE, instance_size_of(instance_type)),
        (dimensions::NODE_ROLE, group.key.role.as_str()),
        (
            dimensions::TENANT,
            group
                .labels
                .get(&config.tenant_label)
                .map_or("", String::as_str),
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let allocation = &group.allocation;
    let values = [
        group.node_count as f64,
        allocation.capacity.memory_bytes as f64,
        allocation.requests.memory_bytes as f64,
        allocation.limits.memory_bytes as f64,
        allocation.capacity.cpu_milli as f64,
        allocation.requests.cpu_milli as f64,
        allocation.limits.cpu_milli as f64,
    ];

    GROUP_METRICS
        .iter()
        .zip(values)
        .map(|(metric, value)| Sample {
            metric_name: config.metric_name(metric),
            dimensions: dims.clone(),
            value,
            kind: MetricKind::Gauge,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::snapshot::{assemble, SnapshotOptions};
    use crate::models::{Allocation, Labels, NodeCapacity, NodeRecord, ResourceUsage, RoleTag};
    use chrono::Utc;

    fn record(labels: &[(&str, &str)]) -> NodeRecord {
        let labels: Labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeRecord {
            node_name: "n".to_string(),
            role: crate::allocation::role::classify_role(&labels),
            instance_type: crate::allocation::role::instance_type_of(&labels).to_string(),
            labels,
            allocation: Allocation {
                capacity: NodeCapacity {
                    cpu_milli: 4000,
                    memory_bytes: 8 << 30,
                    pod_slots: 30,
                },
                requests: ResourceUsage::new(1000, 2 << 30),
                limits: ResourceUsage::new(2000, 4 << 30),
                pods_allocated: 2,
            },
        }
    }

    #[test]
    fn test_instance_size() {
        assert_eq!(instance_size_of("m5.2xlarge"), "2xlarge");
        assert_eq!(instance_size_of("Standard_D4s_v3"), "Standard_D4s_v3");
        assert_eq!(instance_size_of("a.b.c"), "b.c");
        assert_eq!(instance_size_of(""), "");
    }

    #[test]
    fn test_metric_name_prefix() {
        let config = ProjectionConfig::default();
        assert_eq!(config.metric_name(METRIC_CPU_TOTAL), "paas_cluster_cpu_total");

        let bare = ProjectionConfig {
            metric_prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(bare.metric_name(METRIC_CPU_TOTAL), "cluster_cpu_total");
    }

    #[test]
    fn test_seven_samples_per_group() {
        let records = vec![
            record(&[
                ("node-role.kubernetes.io/worker", ""),
                ("node.kubernetes.io/instance-type", "m5.2xlarge"),
                (DEFAULT_TENANT_LABEL, "blue"),
            ]),
            record(&[
                ("node-role.kubernetes.io/worker", ""),
                ("node.kubernetes.io/instance-type", "m5.2xlarge"),
                (DEFAULT_TENANT_LABEL, "blue"),
            ]),
            record(&[("node-role.kubernetes.io/infra", "")]),
        ];
        let snapshot = assemble(records, &SnapshotOptions::default(), Utc::now()).unwrap();

        let samples = project(&snapshot, &ProjectionConfig::default());
        assert_eq!(samples.len(), 14);
        assert!(samples.iter().all(|s| s.kind == MetricKind::Gauge));

        let worker_nodes = samples
            .iter()
            .find(|s| {
                s.metric_name == "paas_cluster_node_count"
                    && s.dimensions[dimensions::NODE_ROLE] == RoleTag::Worker.as_str()
            })
            .unwrap();
        assert_eq!(worker_nodes.value, 2.0);
        assert_eq!(worker_nodes.dimensions[dimensions::INSTANCE_TYPE], "m5.2xlarge");
        assert_eq!(worker_nodes.dimensions[dimensions::INSTANCE_SIZE], "2xlarge");
        assert_eq!(worker_nodes.dimensions[dimensions::TENANT], "blue");

        let worker_cpu = samples
            .iter()
            .find(|s| {
                s.metric_name == "paas_cluster_cpu_requests"
                    && s.dimensions[dimensions::NODE_ROLE] == "worker"
            })
            .unwrap();
        assert_eq!(worker_cpu.value, 2000.0);

        let infra_tenant = samples
            .iter()
            .find(|s| s.dimensions[dimensions::NODE_ROLE] == "infra")
            .map(|s| s.dimensions[dimensions::TENANT].clone());
        assert_eq!(infra_tenant.as_deref(), Some(""));
    }

    #[test]
    fn test_no_samples_without_groups() {
        let snapshot = assemble(
            vec![record(&[("node-role.kubernetes.io/worker", "")])],
            &SnapshotOptions {
                compute_group_totals: false,
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert!(project(&snapshot, &ProjectionConfig::default()).is_empty());
    }

    #[test]
    fn test_failed_cycle_projects_nothing() {
        let outcome: Result<ClusterSnapshot, CollectError> =
            Err(CollectError::ListNodes("connection refused".into()));
        assert!(project_cycle(&outcome, &ProjectionConfig::default()).is_empty());
    }
}
