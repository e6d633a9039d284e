//! Resource aggregation engine
//!
//! Turns a listing of nodes and their pods into per-node, per-group and
//! cluster-wide allocation records:
//! - `extract`: one record per node from its active pods
//! - `role`: role classification and instance-type lookup
//! - `aggregate`: additive folds into totals and (role, instance type) groups
//! - `snapshot`: one collection cycle, all or nothing
//! - `projection`: flattening a snapshot into gauge samples

mod aggregate;
mod extract;
mod projection;
mod role;
mod snapshot;


pub use aggregate::{groups_of, total_of};
pub use extract::{extract_node, pod_requests_and_limits};
pub use projection::{
    dimensions, instance_size_of, project, project_cycle, MetricKind, ProjectionConfig, Sample,
    GROUP_METRICS, METRIC_CPU_LIMITS, METRIC_CPU_REQUESTS, METRIC_CPU_TOTAL, METRIC_MEMORY_LIMITS,
    METRIC_MEMORY_REQUESTS, METRIC_MEMORY_TOTAL, METRIC_NODE_COUNT,
};
pub use role::{
    classify_role, group_key_of, instance_type_of, BETA_INSTANCE_TYPE_LABEL,
    DEFAULT_TENANT_LABEL, INSTANCE_TYPE_LABEL, ROLE_CONTROL_PLANE_LABEL, ROLE_INFRA_LABEL,
    ROLE_MASTER_LABEL, ROLE_WORKER_LABEL, SERVICE_COMPONENT_LABEL,
};
pub use snapshot::{assemble, SnapshotBuilder, SnapshotOptions};
