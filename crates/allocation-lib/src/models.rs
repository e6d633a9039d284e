//! Core data models for the allocation engine
//!
//! Input descriptors (`NodeInfo`, `PodInfo`) are what a cluster source hands
//! to the engine. Records (`NodeRecord`, `GroupRecord`, `TotalRecord`) are
//! what the engine produces. Percentages are never stored: they are computed
//! from the summed counters in `Allocation` whenever they are read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Node or group label set
pub type Labels = BTreeMap<String, String>;

/// Percentage of `numerator` over `denominator`, 0 when the denominator is not positive
pub fn ratio_pct(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64 * 100.0
}

/// Capacity a node offers, read from node status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu_milli: i64,
    pub memory_bytes: i64,
    pub pod_slots: i64,
}

impl NodeCapacity {
    /// Counter-wise sum, `None` if any counter overflows
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            cpu_milli: self.cpu_milli.checked_add(other.cpu_milli)?,
            memory_bytes: self.memory_bytes.checked_add(other.memory_bytes)?,
            pod_slots: self.pod_slots.checked_add(other.pod_slots)?,
        })
    }
}

/// Summed CPU and memory requests or limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_milli: i64,
    pub memory_bytes: i64,
}

impl ResourceUsage {
    pub fn new(cpu_milli: i64, memory_bytes: i64) -> Self {
        Self {
            cpu_milli,
            memory_bytes,
        }
    }

    /// Build from a per-kind quantity map; missing kinds count as zero
    pub fn from_quantities(quantities: &BTreeMap<ResourceKind, i64>) -> Self {
        let get = |kind| quantities.get(&kind).copied().unwrap_or(0);
        Self::new(get(ResourceKind::Cpu), get(ResourceKind::Memory))
    }

    /// Counter-wise sum, `None` if either counter overflows
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            cpu_milli: self.cpu_milli.checked_add(other.cpu_milli)?,
            memory_bytes: self.memory_bytes.checked_add(other.memory_bytes)?,
        })
    }
}

/// Resource kinds the engine aggregates
///
/// Anything else declared on a container (GPUs, ephemeral storage, hugepages)
/// is dropped when the pod is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Millicores
    Cpu,
    /// Bytes
    Memory,
}

impl ResourceKind {
    /// Map a Kubernetes resource name to a kind we aggregate
    pub fn from_resource_name(name: &str) -> Option<Self> {
        match name {
            "cpu" => Some(ResourceKind::Cpu),
            "memory" => Some(ResourceKind::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

/// Node descriptor handed over by a cluster source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub labels: Labels,
    pub ready: bool,
    pub capacity: NodeCapacity,
}

/// Pod lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Succeeded and Failed pods no longer hold node resources
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

/// Declared requests and limits of one container, in canonical units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    pub requests: BTreeMap<ResourceKind, i64>,
    pub limits: BTreeMap<ResourceKind, i64>,
}

/// Pod descriptor handed over by a cluster source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub containers: Vec<ContainerResources>,
}

/// Coarse node role derived from labels
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleTag {
    Master,
    Worker,
    Infra,
    /// Value of the legacy `servicecomponent` label
    Legacy(String),
    Unknown,
}

impl RoleTag {
    /// Tag for a legacy `servicecomponent` value
    ///
    /// Values that name a built-in role map to that role, so a legacy node
    /// lands in the same group as nodes carrying the role label.
    pub fn from_legacy(value: &str) -> Self {
        match value {
            "master" => RoleTag::Master,
            "worker" => RoleTag::Worker,
            "infra" => RoleTag::Infra,
            "unknown" => RoleTag::Unknown,
            other => RoleTag::Legacy(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleTag::Master => "master",
            RoleTag::Worker => "worker",
            RoleTag::Infra => "infra",
            RoleTag::Legacy(value) => value,
            RoleTag::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RoleTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Percentages derived from an `Allocation`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Percentages {
    pub cpu_requests: f64,
    pub cpu_limits: f64,
    pub memory_requests: f64,
    pub memory_limits: f64,
    pub pods_allocated: f64,
}

/// Additive allocation counters for a node, a group, or the whole cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Allocation {
    pub capacity: NodeCapacity,
    pub requests: ResourceUsage,
    pub limits: ResourceUsage,
    pub pods_allocated: i64,
}

impl Allocation {
    pub fn cpu_requests_pct(&self) -> f64 {
        ratio_pct(self.requests.cpu_milli, self.capacity.cpu_milli)
    }

    /// Can exceed 100 when limits are overcommitted
    pub fn cpu_limits_pct(&self) -> f64 {
        ratio_pct(self.limits.cpu_milli, self.capacity.cpu_milli)
    }

    pub fn memory_requests_pct(&self) -> f64 {
        ratio_pct(self.requests.memory_bytes, self.capacity.memory_bytes)
    }

    /// Can exceed 100 when limits are overcommitted
    pub fn memory_limits_pct(&self) -> f64 {
        ratio_pct(self.limits.memory_bytes, self.capacity.memory_bytes)
    }

    pub fn pods_allocated_pct(&self) -> f64 {
        ratio_pct(self.pods_allocated, self.capacity.pod_slots)
    }

    pub fn percentages(&self) -> Percentages {
        Percentages {
            cpu_requests: self.cpu_requests_pct(),
            cpu_limits: self.cpu_limits_pct(),
            memory_requests: self.memory_requests_pct(),
            memory_limits: self.memory_limits_pct(),
            pods_allocated: self.pods_allocated_pct(),
        }
    }

    /// True if any denominator is zero, meaning some percentage is pinned to 0
    pub fn has_zero_capacity(&self) -> bool {
        self.capacity.cpu_milli <= 0 || self.capacity.memory_bytes <= 0 || self.capacity.pod_slots <= 0
    }

    /// Counter-wise sum, `None` if any counter overflows
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            capacity: self.capacity.checked_add(other.capacity)?,
            requests: self.requests.checked_add(other.requests)?,
            limits: self.limits.checked_add(other.limits)?,
            pods_allocated: self.pods_allocated.checked_add(other.pods_allocated)?,
        })
    }
}

impl Serialize for Allocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            capacity: &'a NodeCapacity,
            requests: &'a ResourceUsage,
            limits: &'a ResourceUsage,
            pods_allocated: i64,
            percentages: Percentages,
        }

        Repr {
            capacity: &self.capacity,
            requests: &self.requests,
            limits: &self.limits,
            pods_allocated: self.pods_allocated,
            percentages: self.percentages(),
        }
        .serialize(serializer)
    }
}

/// Allocation of a single eligible node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub node_name: String,
    pub role: RoleTag,
    pub instance_type: String,
    #[serde(skip)]
    pub labels: Labels,
    #[serde(flatten)]
    pub allocation: Allocation,
}

/// Aggregation bucket identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub role: RoleTag,
    pub instance_type: String,
}

impl GroupKey {
    pub fn new(role: RoleTag, instance_type: impl Into<String>) -> Self {
        Self {
            role,
            instance_type: instance_type.into(),
        }
    }
}

/// Allocation summed over all nodes sharing a `GroupKey`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    #[serde(flatten)]
    pub key: GroupKey,
    pub node_count: usize,
    /// Labels every member node carries with the same value
    #[serde(skip)]
    pub labels: Labels,
    #[serde(flatten)]
    pub allocation: Allocation,
}

/// Allocation summed over every eligible node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TotalRecord {
    pub node_count: usize,
    #[serde(flatten)]
    pub allocation: Allocation,
}

/// Result of one collection cycle
///
/// Built fresh every cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    collected_at: DateTime<Utc>,
    totals: TotalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<GroupRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<Vec<NodeRecord>>,
}

impl ClusterSnapshot {
    pub(crate) fn new(
        collected_at: DateTime<Utc>,
        totals: TotalRecord,
        groups: Option<Vec<GroupRecord>>,
        nodes: Option<Vec<NodeRecord>>,
    ) -> Self {
        Self {
            collected_at,
            totals,
            groups,
            nodes,
        }
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn totals(&self) -> &TotalRecord {
        &self.totals
    }

    /// Per-group rollups, present only when group totals were requested
    pub fn groups(&self) -> Option<&[GroupRecord]> {
        self.groups.as_deref()
    }

    /// Per-node detail, present only when node details were requested
    pub fn nodes(&self) -> Option<&[NodeRecord]> {
        self.nodes.as_deref()
    }
}
