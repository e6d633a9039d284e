//! `snapshot` command: one collection cycle printed as totals, groups and nodes

use allocation_lib::{
    Allocation, ClusterSnapshot, ClusterSource, GroupRecord, NodeRecord, SnapshotBuilder,
    SnapshotOptions,
};
use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{
    color_percent, format_bytes, format_cpu, print_heading, print_json, print_table, OutputFormat,
};

/// Row for the cluster totals table
#[derive(Tabled)]
struct TotalRow {
    #[tabled(rename = "Resource")]
    resource: &'static str,
    #[tabled(rename = "Capacity")]
    capacity: String,
    #[tabled(rename = "Requests")]
    requests: String,
    #[tabled(rename = "Requests %")]
    requests_pct: String,
    #[tabled(rename = "Limits")]
    limits: String,
    #[tabled(rename = "Limits %")]
    limits_pct: String,
}

/// Row for the group and node tables
#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Instance Type")]
    instance_type: String,
    #[tabled(rename = "Nodes")]
    nodes: usize,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "CPU Req %")]
    cpu_requests_pct: String,
    #[tabled(rename = "CPU Lim %")]
    cpu_limits_pct: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Mem Req %")]
    memory_requests_pct: String,
    #[tabled(rename = "Mem Lim %")]
    memory_limits_pct: String,
    #[tabled(rename = "Pods %")]
    pods_pct: String,
}

impl AllocationRow {
    fn new(name: String, role: &str, instance_type: &str, nodes: usize, a: &Allocation) -> Self {
        Self {
            name,
            role: role.to_string(),
            instance_type: display_or_dash(instance_type),
            nodes,
            cpu: format_cpu(a.capacity.cpu_milli),
            cpu_requests_pct: color_percent(a.cpu_requests_pct()),
            cpu_limits_pct: color_percent(a.cpu_limits_pct()),
            memory: format_bytes(a.capacity.memory_bytes),
            memory_requests_pct: color_percent(a.memory_requests_pct()),
            memory_limits_pct: color_percent(a.memory_limits_pct()),
            pods_pct: color_percent(a.pods_allocated_pct()),
        }
    }
}

fn display_or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn total_rows(a: &Allocation) -> Vec<TotalRow> {
    vec![
        TotalRow {
            resource: "cpu",
            capacity: format_cpu(a.capacity.cpu_milli),
            requests: format_cpu(a.requests.cpu_milli),
            requests_pct: color_percent(a.cpu_requests_pct()),
            limits: format_cpu(a.limits.cpu_milli),
            limits_pct: color_percent(a.cpu_limits_pct()),
        },
        TotalRow {
            resource: "memory",
            capacity: format_bytes(a.capacity.memory_bytes),
            requests: format_bytes(a.requests.memory_bytes),
            requests_pct: color_percent(a.memory_requests_pct()),
            limits: format_bytes(a.limits.memory_bytes),
            limits_pct: color_percent(a.memory_limits_pct()),
        },
        TotalRow {
            resource: "pods",
            capacity: a.capacity.pod_slots.to_string(),
            requests: a.pods_allocated.to_string(),
            requests_pct: color_percent(a.pods_allocated_pct()),
            limits: "-".to_string(),
            limits_pct: "-".to_string(),
        },
    ]
}

fn group_rows(groups: &[GroupRecord]) -> Vec<AllocationRow> {
    groups
        .iter()
        .map(|g| {
            let name = format!("{}/{}", g.key.role, display_or_dash(&g.key.instance_type));
            AllocationRow::new(
                name,
                g.key.role.as_str(),
                &g.key.instance_type,
                g.node_count,
                &g.allocation,
            )
        })
        .collect()
}

fn node_rows(nodes: &[NodeRecord]) -> Vec<AllocationRow> {
    nodes
        .iter()
        .map(|n| {
            AllocationRow::new(
                n.node_name.clone(),
                n.role.as_str(),
                &n.instance_type,
                1,
                &n.allocation,
            )
        })
        .collect()
}

/// Run one cycle and build the snapshot
pub async fn collect(
    source: Arc<dyn ClusterSource>,
    options: SnapshotOptions,
) -> Result<ClusterSnapshot> {
    SnapshotBuilder::new(source, options)
        .build()
        .await
        .context("Failed to collect cluster allocation")
}

/// Show the cluster snapshot
pub async fn show_snapshot(
    source: Arc<dyn ClusterSource>,
    options: SnapshotOptions,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = collect(source, options).await?;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => print_snapshot(&snapshot),
    }

    Ok(())
}

fn print_snapshot(snapshot: &ClusterSnapshot) {
    let totals = snapshot.totals();

    print_heading("Cluster Allocation");
    println!(
        "Collected at:           {}",
        snapshot
            .collected_at()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
    );
    println!("Nodes:                  {}", totals.node_count.to_string().cyan());
    println!();
    print_table(&total_rows(&totals.allocation), "No eligible nodes");

    if let Some(groups) = snapshot.groups() {
        println!();
        println!("{}", "Groups".bold());
        print_table(&group_rows(groups), "No groups");
    }

    if let Some(nodes) = snapshot.nodes() {
        println!();
        println!("{}", "Nodes".bold());
        print_table(&node_rows(nodes), "No eligible nodes");
    }
}
