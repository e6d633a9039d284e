//! Cluster-wide and per-group folding of node records
//!
//! Both folds only add counters. Percentages of a total or a group come from
//! the summed counters (see `Allocation`), never from averaging node
//! percentages, and the result does not depend on record order.

use crate::error::CollectError;
use crate::models::{Allocation, GroupKey, GroupRecord, Labels, NodeRecord, TotalRecord};
use std::collections::BTreeMap;

/// Sum every record into the cluster total
pub fn total_of(records: &[NodeRecord]) -> Result<TotalRecord, CollectError> {
    let allocation = records
        .iter()
        .try_fold(Allocation::default(), |acc, record| acc.checked_add(record.allocation))
        .ok_or_else(|| CollectError::overflow("cluster total"))?;

    Ok(TotalRecord {
        node_count: records.len(),
        allocation,
    })
}

/// Sum records sharing a (role, instance type) key
///
/// Groups come back sorted by key.
pub fn groups_of(records: &[NodeRecord]) -> Result<Vec<GroupRecord>, CollectError> {
    let groups = records.iter().try_fold(BTreeMap::new(), fold_into_groups)?;
    Ok(groups.into_values().collect())
}

fn fold_into_groups(
    mut groups: BTreeMap<GroupKey, GroupRecord>,
    record: &NodeRecord,
) -> Result<BTreeMap<GroupKey, GroupRecord>, CollectError> {
    let key = GroupKey::new(record.role.clone(), record.instance_type.as_str());
    let merged = match groups.remove(&key) {
        Some(group) => merge(group, record)?,
        None => GroupRecord {
            key: key.clone(),
            node_count: 1,
            labels: record.labels.clone(),
            allocation: record.allocation,
        },
    };
    groups.insert(key, merged);
    Ok(groups)
}

fn merge(group: GroupRecord, record: &NodeRecord) -> Result<GroupRecord, CollectError> {
    let allocation = group.allocation.checked_add(record.allocation).ok_or_else(|| {
        CollectError::overflow(format!(
            "group {}/{}",
            group.key.role.as_str(),
            group.key.instance_type
        ))
    })?;

    Ok(GroupRecord {
        key: group.key,
        node_count: group.node_count + 1,
        labels: common_labels(group.labels, &record.labels),
        allocation,
    })
}

/// Keep only the labels present with an identical value on both sides
fn common_labels(mut shared: Labels, other: &Labels) -> Labels {
    shared.retain(|key, value| other.get(key) == Some(value));
    shared
}
