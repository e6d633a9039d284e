//! Cluster source backed by the Kubernetes API

use super::quantity::{parse_count, parse_cpu_millis, parse_memory_bytes};
use super::{ClusterSource, LabelSelector};
use crate::error::{CollectError, QuantityError};
use crate::models::{ContainerResources, NodeCapacity, NodeInfo, PodInfo, PodPhase, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

/// Lists nodes and pods through a kube client
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
}

impl KubeSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster config or the local kubeconfig
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }
}

#[async_trait]
impl ClusterSource for KubeSource {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<NodeInfo>, CollectError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(selector.as_str());
        }

        let list = api
            .list(&params)
            .await
            .map_err(|e| CollectError::ListNodes(Box::new(e)))?;
        debug!(nodes = list.items.len(), selector = %selector.as_str(), "Listed nodes");

        list.items.iter().map(node_info).collect()
    }

    async fn list_active_pods(&self, node_name: &str) -> Result<Vec<PodInfo>, CollectError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&active_pods_field_selector(node_name));

        let list = api.list(&params).await.map_err(|e| CollectError::ListPods {
            node: node_name.to_string(),
            source: Box::new(e),
        })?;
        debug!(node = %node_name, pods = list.items.len(), "Listed non-terminated pods");

        list.items.iter().map(pod_info).collect()
    }
}

/// Field selector for pods scheduled on a node that are not in a terminal phase
pub fn active_pods_field_selector(node_name: &str) -> String {
    format!(
        "spec.nodeName={},status.phase!=Succeeded,status.phase!=Failed",
        node_name
    )
}

/// Ready when a `Ready` condition reports `True`
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map_or(false, |conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

fn node_info(node: &Node) -> Result<NodeInfo, CollectError> {
    let name = node.name_any();
    let capacity = node
        .status
        .as_ref()
        .and_then(|status| status.capacity.as_ref());

    let read = |resource: &str, parse: fn(&str) -> Result<i64, QuantityError>| {
        read_quantity(capacity, resource, parse, &name)
    };

    Ok(NodeInfo {
        capacity: NodeCapacity {
            cpu_milli: read("cpu", parse_cpu_millis)?,
            memory_bytes: read("memory", parse_memory_bytes)?,
            pod_slots: read("pods", parse_count)?,
        },
        labels: node.labels().clone(),
        ready: node_is_ready(node),
        name,
    })
}

fn pod_info(pod: &Pod) -> Result<PodInfo, CollectError> {
    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    let object = format!("pod {}/{}", namespace, name);

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|container| {
            let resources = container.resources.as_ref();
            Ok(ContainerResources {
                requests: quantities(resources.and_then(|r| r.requests.as_ref()), &object)?,
                limits: quantities(resources.and_then(|r| r.limits.as_ref()), &object)?,
            })
        })
        .collect::<Result<Vec<_>, CollectError>>()?;

    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map(PodPhase::parse)
        .unwrap_or_default();

    Ok(PodInfo {
        name,
        namespace,
        phase,
        containers,
    })
}

/// Keep CPU and memory, dropping every other resource name
fn quantities(
    declared: Option<&BTreeMap<String, Quantity>>,
    object: &str,
) -> Result<BTreeMap<ResourceKind, i64>, CollectError> {
    let mut parsed = BTreeMap::new();
    for (name, quantity) in declared.into_iter().flatten() {
        let Some(kind) = ResourceKind::from_resource_name(name) else {
            continue;
        };
        let parse = match kind {
            ResourceKind::Cpu => parse_cpu_millis,
            ResourceKind::Memory => parse_memory_bytes,
        };
        let value = parse(&quantity.0).map_err(|source| CollectError::Quantity {
            object: object.to_string(),
            resource: name.clone(),
            value: quantity.0.clone(),
            source,
        })?;
        parsed.insert(kind, value);
    }
    Ok(parsed)
}

/// Missing capacity entries read as zero
fn read_quantity(
    capacity: Option<&BTreeMap<String, Quantity>>,
    resource: &str,
    parse: fn(&str) -> Result<i64, QuantityError>,
    node_name: &str,
) -> Result<i64, CollectError> {
    match capacity.and_then(|c| c.get(resource)) {
        Some(quantity) => parse(&quantity.0).map_err(|source| CollectError::Quantity {
            object: format!("node {}", node_name),
            resource: resource.to_string(),
            value: quantity.0.clone(),
            source,
        }),
        None => Ok(0),
    }
}
