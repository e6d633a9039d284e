//! Role classification and instance-type lookup
//!
//! These are the only places where node label strings turn into typed data.

use crate::models::{GroupKey, Labels, RoleTag};

pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";
pub const BETA_INSTANCE_TYPE_LABEL: &str = "beta.kubernetes.io/instance-type";

pub const ROLE_MASTER_LABEL: &str = "node-role.kubernetes.io/master";
pub const ROLE_CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";
pub const ROLE_WORKER_LABEL: &str = "node-role.kubernetes.io/worker";
pub const ROLE_INFRA_LABEL: &str = "node-role.kubernetes.io/infra";

/// OpenShift 3.11 single-value role label
pub const SERVICE_COMPONENT_LABEL: &str = "servicecomponent";

pub const DEFAULT_TENANT_LABEL: &str = "tenant.paas.redhat.com/tenant";

/// Classify a node by its labels
///
/// First match wins: master, worker, infra, then the legacy
/// `servicecomponent` value, then `Unknown`. Only key presence matters for
/// the role labels. A legacy value naming a built-in role classifies as that
/// role.
pub fn classify_role(labels: &Labels) -> RoleTag {
    if labels.contains_key(ROLE_MASTER_LABEL) || labels.contains_key(ROLE_CONTROL_PLANE_LABEL) {
        return RoleTag::Master;
    }
    if labels.contains_key(ROLE_WORKER_LABEL) {
        return RoleTag::Worker;
    }
    if labels.contains_key(ROLE_INFRA_LABEL) {
        return RoleTag::Infra;
    }

    match labels.get(SERVICE_COMPONENT_LABEL) {
        Some(value) if !value.is_empty() => RoleTag::from_legacy(value),
        _ => RoleTag::Unknown,
    }
}

/// Instance type of a node, empty if neither label is set
pub fn instance_type_of(labels: &Labels) -> &str {
    labels
        .get(INSTANCE_TYPE_LABEL)
        .or_else(|| labels.get(BETA_INSTANCE_TYPE_LABEL))
        .map(String::as_str)
        .unwrap_or("")
}

/// Group key a node with these labels falls into
pub fn group_key_of(labels: &Labels) -> GroupKey {
    GroupKey::new(classify_role(labels), instance_type_of(labels))
}
