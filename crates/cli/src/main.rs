//! Cluster Allocation CLI
//!
//! A command-line tool that runs one allocation cycle against the current
//! kubeconfig context and prints the snapshot or the samples it projects.

mod commands;
mod config;
mod output;

use allocation_lib::allocation::DEFAULT_TENANT_LABEL;
use allocation_lib::{ClusterSource, KubeSource, ProjectionConfig, SnapshotOptions};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{samples, snapshot};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Cluster Allocation CLI
#[derive(Parser)]
#[command(name = "allocctl")]
#[command(author, version, about = "CLI for Cluster Allocation metrics", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses ~/.kube/config or in-cluster config if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Node selection shared by every command
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Label selector restricting the nodes, e.g. '!node-role.kubernetes.io/master'
    #[arg(long, short = 'l', env = "ALLOCATION_LABEL_SELECTOR", default_value = "")]
    pub selector: String,

    /// Count nodes regardless of their Ready condition
    #[arg(long)]
    pub ignore_node_status: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show cluster totals, per-group rollups and optionally per-node detail
    Snapshot {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Skip the (role, instance type) groups
        #[arg(long)]
        no_groups: bool,

        /// Include one row per node
        #[arg(long)]
        nodes: bool,
    },

    /// Show the gauge samples the agent would export
    Samples {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Node label the tenant dimension is read from
        #[arg(long, env = "ALLOCATION_TENANT_LABEL", default_value = DEFAULT_TENANT_LABEL)]
        tenant_label: String,

        /// Metric name prefix; empty for none
        #[arg(long, env = "ALLOCATION_METRIC_PREFIX", default_value = "paas")]
        prefix: String,
    },
}

impl SelectionArgs {
    fn options(&self) -> SnapshotOptions {
        SnapshotOptions {
            label_selector: self.selector.clone(),
            ignore_node_readiness: self.ignore_node_status,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let client = config::kube_client(cli.kubeconfig.as_deref()).await?;
    let source: Arc<dyn ClusterSource> = Arc::new(KubeSource::new(client));

    match cli.command {
        Commands::Snapshot {
            selection,
            no_groups,
            nodes,
        } => {
            let options = SnapshotOptions {
                compute_group_totals: !no_groups,
                include_node_details: nodes,
                ..selection.options()
            };
            snapshot::show_snapshot(source, options, cli.format).await?;
        }
        Commands::Samples {
            selection,
            tenant_label,
            prefix,
        } => {
            let projection = ProjectionConfig {
                metric_prefix: prefix,
                tenant_label,
            };
            samples::show_samples(source, selection.options(), projection, cli.format).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_snapshot_flags() {
        let cli = Cli::try_parse_from([
            "allocctl",
            "--format",
            "json",
            "snapshot",
            "--selector",
            "node-role.kubernetes.io/worker",
            "--ignore-node-status",
            "--no-groups",
            "--nodes",
        ])
        .unwrap();

        assert_eq!(cli.format, output::OutputFormat::Json);
        match cli.command {
            Commands::Snapshot {
                selection,
                no_groups,
                nodes,
            } => {
                let options = selection.options();
                assert_eq!(options.label_selector, "node-role.kubernetes.io/worker");
                assert!(options.ignore_node_readiness);
                assert!(no_groups);
                assert!(nodes);
            }
            _ => panic!("expected snapshot command"),
        }
    }

    #[test]
    fn test_samples_defaults() {
        let cli = Cli::try_parse_from(["allocctl", "samples"]).unwrap();
        match cli.command {
            Commands::Samples {
                tenant_label,
                prefix,
                ..
            } => {
                assert_eq!(tenant_label, DEFAULT_TENANT_LABEL);
                assert_eq!(prefix, "paas");
            }
            _ => panic!("expected samples command"),
        }
    }
}
