//! Per-node resource extraction

use super::role::group_key_of;
use crate::error::CollectError;
use crate::models::{Allocation, NodeInfo, NodeRecord, PodInfo, ResourceUsage};
use tracing::debug;

/// Sum a pod's container requests and limits
///
/// A container that declares nothing for a kind contributes zero for it.
/// Returns `None` if a sum leaves the i64 range.
pub fn pod_requests_and_limits(pod: &PodInfo) -> Option<(ResourceUsage, ResourceUsage)> {
    pod.containers.iter().try_fold(
        (ResourceUsage::default(), ResourceUsage::default()),
        |(requests, limits), container| {
            Some((
                requests.checked_add(ResourceUsage::from_quantities(&container.requests))?,
                limits.checked_add(ResourceUsage::from_quantities(&container.limits))?,
            ))
        },
    )
}

/// Build the allocation record of one node from its pods
///
/// Pods in a terminal phase are skipped here even if the source already
/// filtered them, so they never count toward requests, limits or pods.
pub fn extract_node(node: &NodeInfo, pods: &[PodInfo]) -> Result<NodeRecord, CollectError> {
    let active: Vec<&PodInfo> = pods.iter().filter(|pod| !pod.phase.is_terminal()).collect();
    let overflow = || CollectError::overflow(format!("node {}", node.name));

    let (requests, limits) = active.iter().try_fold(
        (ResourceUsage::default(), ResourceUsage::default()),
        |(req_acc, lim_acc), pod| {
            let (req, lim) = pod_requests_and_limits(pod).ok_or_else(overflow)?;
            Ok::<_, CollectError>((
                req_acc.checked_add(req).ok_or_else(overflow)?,
                lim_acc.checked_add(lim).ok_or_else(overflow)?,
            ))
        },
    )?;

    let allocation = Allocation {
        capacity: node.capacity,
        requests,
        limits,
        pods_allocated: active.len() as i64,
    };

    if allocation.has_zero_capacity() {
        debug!(
            node = %node.name,
            cpu_milli = node.capacity.cpu_milli,
            memory_bytes = node.capacity.memory_bytes,
            pod_slots = node.capacity.pod_slots,
            "Node reports zero capacity for some resource, percentage pinned to 0"
        );
    }

    let key = group_key_of(&node.labels);
    Ok(NodeRecord {
        node_name: node.name.clone(),
        role: key.role,
        instance_type: key.instance_type,
        labels: node.labels.clone(),
        allocation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerResources, NodeCapacity, PodPhase, ResourceKind, RoleTag};
    use std::collections::BTreeMap;

    fn container(req: &[(ResourceKind, i64)], lim: &[(ResourceKind, i64)]) -> ContainerResources {
        ContainerResources {
            requests: req.iter().copied().collect::<BTreeMap<_, _>>(),
            limits: lim.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    fn pod(phase: PodPhase, containers: Vec<ContainerResources>) -> PodInfo {
        PodInfo {
            name: "pod".to_string(),
            namespace: "default".to_string(),
            phase,
            containers,
        }
    }

    fn node(cpu_milli: i64, memory_bytes: i64, pod_slots: i64) -> NodeInfo {
        NodeInfo {
            name: "node-1".to_string(),
            labels: BTreeMap::new(),
            ready: true,
            capacity: NodeCapacity {
                cpu_milli,
                memory_bytes,
                pod_slots,
            },
        }
    }

    #[test]
    fn test_pod_sums_all_containers() {
        let p = pod(
            PodPhase::Running,
            vec![
                container(
                    &[(ResourceKind::Cpu, 100), (ResourceKind::Memory, 64)],
                    &[(ResourceKind::Cpu, 200)],
                ),
                container(&[(ResourceKind::Cpu, 50)], &[(ResourceKind::Memory, 128)]),
                container(&[], &[]),
            ],
        );

        let (requests, limits) = pod_requests_and_limits(&p).unwrap();
        assert_eq!(requests, ResourceUsage::new(150, 64));
        assert_eq!(limits, ResourceUsage::new(200, 128));
    }

    #[test]
    fn test_node_with_no_pods() {
        let record = extract_node(&node(2000, 4096, 10), &[]).unwrap();
        assert_eq!(record.allocation.requests, ResourceUsage::default());
        assert_eq!(record.allocation.pods_allocated, 0);
        assert_eq!(record.allocation.cpu_requests_pct(), 0.0);
        assert_eq!(record.role, RoleTag::Unknown);
        assert_eq!(record.instance_type, "");
    }

    #[test]
    fn test_terminal_pods_contribute_nothing() {
        let busy = vec![container(
            &[(ResourceKind::Cpu, 1000), (ResourceKind::Memory, 1024)],
            &[(ResourceKind::Cpu, 2000), (ResourceKind::Memory, 2048)],
        )];
        let pods = vec![
            pod(PodPhase::Succeeded, busy.clone()),
            pod(PodPhase::Failed, busy.clone()),
            pod(PodPhase::Running, vec![container(&[(ResourceKind::Cpu, 250)], &[])]),
        ];

        let record = extract_node(&node(1000, 4096, 10), &pods).unwrap();
        assert_eq!(record.allocation.requests, ResourceUsage::new(250, 0));
        assert_eq!(record.allocation.limits, ResourceUsage::default());
        assert_eq!(record.allocation.pods_allocated, 1);
    }

    #[test]
    fn test_node_percentages() {
        let pods = vec![
            pod(
                PodPhase::Running,
                vec![container(
                    &[(ResourceKind::Cpu, 500), (ResourceKind::Memory, 1024)],
                    &[(ResourceKind::Cpu, 3000), (ResourceKind::Memory, 8192)],
                )],
            ),
            pod(PodPhase::Pending, vec![container(&[(ResourceKind::Cpu, 500)], &[])]),
        ];

        let record = extract_node(&node(2000, 4096, 8), &pods).unwrap();
        let pct = record.allocation.percentages();
        assert_eq!(pct.cpu_requests, 50.0);
        assert_eq!(pct.cpu_limits, 150.0);
        assert_eq!(pct.memory_requests, 25.0);
        assert_eq!(pct.memory_limits, 200.0);
        assert_eq!(pct.pods_allocated, 25.0);
    }

    #[test]
    fn test_zero_capacity_guards_are_independent() {
        let pods = vec![pod(
            PodPhase::Running,
            vec![container(
                &[(ResourceKind::Cpu, 500), (ResourceKind::Memory, 1024)],
                &[],
            )],
        )];

        let no_cpu = extract_node(&node(0, 4096, 10), &pods).unwrap();
        assert_eq!(no_cpu.allocation.cpu_requests_pct(), 0.0);
        assert_eq!(no_cpu.allocation.memory_requests_pct(), 25.0);
        assert_eq!(no_cpu.allocation.pods_allocated_pct(), 10.0);

        let no_memory = extract_node(&node(1000, 0, 10), &pods).unwrap();
        assert_eq!(no_memory.allocation.cpu_requests_pct(), 50.0);
        assert_eq!(no_memory.allocation.memory_requests_pct(), 0.0);

        let no_slots = extract_node(&node(1000, 4096, 0), &pods).unwrap();
        assert_eq!(no_slots.allocation.pods_allocated_pct(), 0.0);
        assert!(!no_slots.allocation.pods_allocated_pct().is_nan());
    }

    #[test]
    fn test_overflowing_limits_fail_the_node() {
        let huge = i64::MAX / 2 + 1;
        let pods = vec![
            pod(PodPhase::Running, vec![container(&[], &[(ResourceKind::Memory, huge)])]),
            pod(PodPhase::Running, vec![container(&[], &[(ResourceKind::Memory, huge)])]),
        ];

        let err = extract_node(&node(1000, 4096, 10), &pods).unwrap_err();
        assert!(matches!(err, CollectError::Overflow { ref scope } if scope == "node node-1"));

        let one_pod = pod(
            PodPhase::Running,
            vec![
                container(&[(ResourceKind::Cpu, i64::MAX)], &[]),
                container(&[(ResourceKind::Cpu, 1)], &[]),
            ],
        );
        assert!(pod_requests_and_limits(&one_pod).is_none());
    }
}
