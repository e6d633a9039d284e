//! Agent configuration

use allocation_lib::allocation::{ProjectionConfig, SnapshotOptions, DEFAULT_TENANT_LABEL};
use allocation_lib::collector::LabelSelector;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable prefix, e.g. `ALLOCATION_LABEL_SELECTOR`
pub const ENV_PREFIX: &str = "ALLOCATION";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Cluster name attached to every exported gauge
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Label selector restricting the nodes collected; empty for all
    #[serde(default)]
    pub label_selector: String,

    /// Count nodes regardless of their Ready condition
    #[serde(default)]
    pub ignore_node_readiness: bool,

    /// Compute (role, instance type) groups
    #[serde(default = "default_true")]
    pub compute_group_totals: bool,

    /// Keep per-node records in each snapshot
    #[serde(default)]
    pub include_node_details: bool,

    /// Pause between collection cycles in seconds
    #[serde(default = "default_reporting_delay")]
    pub reporting_delay_secs: u64,

    /// Deadline for one collection cycle in seconds
    #[serde(default = "default_reporting_timeout")]
    pub reporting_timeout_secs: u64,

    /// Node label the tenant dimension is read from
    #[serde(default = "default_tenant_label")]
    pub tenant_label: String,

    /// Prefix for exported metric names
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,
}

fn default_cluster_name() -> String {
    std::env::var("CLUSTER_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_reporting_delay() -> u64 {
    300
}

fn default_reporting_timeout() -> u64 {
    30
}

fn default_tenant_label() -> String {
    DEFAULT_TENANT_LABEL.to_string()
}

fn default_metric_prefix() -> String {
    "paas".to_string()
}

impl AgentConfig {
    /// Load configuration from `ALLOCATION_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("failed to read agent configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("invalid agent configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every cycle fail
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.reporting_delay_secs > 0,
            "reporting_delay_secs must be greater than zero"
        );
        ensure!(
            self.reporting_timeout_secs > 0,
            "reporting_timeout_secs must be greater than zero"
        );
        LabelSelector::parse(&self.label_selector).context("invalid label_selector")?;
        Ok(())
    }

    pub fn snapshot_options(&self) -> SnapshotOptions {
        SnapshotOptions {
            label_selector: self.label_selector.clone(),
            ignore_node_readiness: self.ignore_node_readiness,
            compute_group_totals: self.compute_group_totals,
            include_node_details: self.include_node_details,
        }
    }

    pub fn projection(&self) -> ProjectionConfig {
        ProjectionConfig {
            metric_prefix: self.metric_prefix.clone(),
            tenant_label: self.tenant_label.clone(),
        }
    }

    pub fn reporting_delay(&self) -> Duration {
        Duration::from_secs(self.reporting_delay_secs)
    }

    pub fn reporting_timeout(&self) -> Duration {
        Duration::from_secs(self.reporting_timeout_secs)
    }

    /// Snapshot age past which `/readyz` flags the export as stale: two
    /// missed cycles plus one cycle deadline
    pub fn stale_after(&self) -> Duration {
        self.reporting_delay() * 2 + self.reporting_timeout()
    }
}
