//! Observability infrastructure for the allocation agent
//!
//! Provides:
//! - Prometheus self-metrics (cycle latency, errors, nodes and groups observed)
//! - The Prometheus publisher that exports projected allocation samples
//! - Structured JSON logging with tracing

use crate::allocation::{
    dimensions, ProjectionConfig, Sample, GROUP_METRICS, METRIC_CPU_LIMITS, METRIC_CPU_REQUESTS,
    METRIC_CPU_TOTAL, METRIC_MEMORY_LIMITS, METRIC_MEMORY_REQUESTS, METRIC_MEMORY_TOTAL,
    METRIC_NODE_COUNT,
};
use crate::error::CollectError;
use chrono::{DateTime, Utc};
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, GaugeVec, Histogram, IntCounter,
    IntGauge, Opts, Registry,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Label names on every exported allocation gauge
pub const SAMPLE_LABELS: [&str; 5] = [
    "cluster",
    dimensions::INSTANCE_TYPE,
    dimensions::INSTANCE_SIZE,
    dimensions::NODE_ROLE,
    dimensions::TENANT,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    cycle_latency_seconds: Histogram,
    cycle_errors: IntCounter,
    nodes_observed: IntGauge,
    groups_observed: IntGauge,
    last_success_timestamp: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "allocation_agent_cycle_latency_seconds",
                "Time spent listing the cluster and aggregating allocations",
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycle_errors: register_int_counter!(
                "allocation_agent_cycle_errors_total",
                "Total number of collection cycles that failed or timed out"
            )
            .expect("Failed to register cycle_errors"),

            nodes_observed: register_int_gauge!(
                "allocation_agent_nodes_observed",
                "Number of eligible nodes in the last successful cycle"
            )
            .expect("Failed to register nodes_observed"),

            groups_observed: register_int_gauge!(
                "allocation_agent_groups_observed",
                "Number of (role, instance type) groups in the last successful cycle"
            )
            .expect("Failed to register groups_observed"),

            last_success_timestamp: register_int_gauge!(
                "allocation_agent_last_success_timestamp_seconds",
                "Unix time of the last successful collection cycle"
            )
            .expect("Failed to register last_success_timestamp"),
        }
    }
}

/// Agent self-metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    inner: &'static AgentMetricsInner,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(AgentMetricsInner::new),
        }
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner.cycle_latency_seconds.observe(duration_secs);
    }

    pub fn inc_cycle_errors(&self) {
        self.inner.cycle_errors.inc();
    }

    pub fn set_nodes_observed(&self, count: i64) {
        self.inner.nodes_observed.set(count);
    }

    pub fn set_groups_observed(&self, count: i64) {
        self.inner.groups_observed.set(count);
    }

    pub fn set_last_success_timestamp(&self, timestamp: i64) {
        self.inner.last_success_timestamp.set(timestamp);
    }
}

/// Destination for the samples of a successful cycle
pub trait SampleSink: Send + Sync {
    /// Replace everything previously published with `samples`
    fn publish(&self, samples: &[Sample], collected_at: DateTime<Utc>);
}

/// Label values of one exported series, in `SAMPLE_LABELS` order
type LabelSet = Vec<String>;

/// Exports samples as Prometheus gauges
///
/// Each publish replaces the previous label sets, so groups that vanish
/// from the cluster stop being exported. New values are written before stale
/// series are removed; a scrape never sees an empty export.
pub struct PrometheusPublisher {
    cluster: String,
    gauges: HashMap<String, GaugeVec>,
    snapshot_timestamp: IntGauge,
    exported: Mutex<HashMap<String, HashSet<LabelSet>>>,
}

impl PrometheusPublisher {
    /// Register the allocation gauges on the process-wide default registry
    pub fn new(prefix: &str, cluster: impl Into<String>) -> Result<Self, prometheus::Error> {
        Self::with_registry(prometheus::default_registry(), prefix, cluster)
    }

    pub fn with_registry(
        registry: &Registry,
        prefix: &str,
        cluster: impl Into<String>,
    ) -> Result<Self, prometheus::Error> {
        let naming = ProjectionConfig {
            metric_prefix: prefix.to_string(),
            ..Default::default()
        };

        let mut gauges = HashMap::with_capacity(GROUP_METRICS.len());
        for metric in GROUP_METRICS {
            let name = naming.metric_name(metric);
            let gauge = GaugeVec::new(Opts::new(name.clone(), help_for(metric)), &SAMPLE_LABELS)?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.insert(name, gauge);
        }

        let snapshot_timestamp = IntGauge::new(
            naming.metric_name("cluster_snapshot_timestamp_seconds"),
            "Unix time the exported allocation snapshot was collected",
        )?;
        registry.register(Box::new(snapshot_timestamp.clone()))?;

        Ok(Self {
            cluster: cluster.into(),
            gauges,
            snapshot_timestamp,
            exported: Mutex::new(HashMap::new()),
        })
    }

    fn label_set(&self, sample: &Sample) -> LabelSet {
        let dimension = |name: &str| sample.dimensions.get(name).cloned().unwrap_or_default();
        vec![
            self.cluster.clone(),
            dimension(dimensions::INSTANCE_TYPE),
            dimension(dimensions::INSTANCE_SIZE),
            dimension(dimensions::NODE_ROLE),
            dimension(dimensions::TENANT),
        ]
    }
}

impl SampleSink for PrometheusPublisher {
    fn publish(&self, samples: &[Sample], collected_at: DateTime<Utc>) {
        // Held for the whole publish so concurrent publishers do not interleave
        let mut exported = self.exported.lock().unwrap_or_else(PoisonError::into_inner);

        let mut current: HashMap<String, HashSet<LabelSet>> = HashMap::new();
        for sample in samples {
            let Some(gauge) = self.gauges.get(&sample.metric_name) else {
                warn!(metric = %sample.metric_name, "Dropping sample for unregistered metric");
                continue;
            };
            let labels = self.label_set(sample);
            let values: Vec<&str> = labels.iter().map(String::as_str).collect();
            gauge.with_label_values(&values).set(sample.value);
            current
                .entry(sample.metric_name.clone())
                .or_default()
                .insert(labels);
        }

        let mut removed = 0usize;
        for (metric, previous) in exported.iter() {
            let Some(gauge) = self.gauges.get(metric) else {
                continue;
            };
            let kept = current.get(metric);
            for labels in previous {
                if kept.is_some_and(|kept| kept.contains(labels)) {
                    continue;
                }
                let values: Vec<&str> = labels.iter().map(String::as_str).collect();
                if gauge.remove_label_values(&values).is_ok() {
                    removed += 1;
                }
            }
        }
        *exported = current;

        self.snapshot_timestamp.set(collected_at.timestamp());
        debug!(samples = samples.len(), removed, "Published allocation samples");
    }
}

fn help_for(metric: &str) -> &'static str {
    match metric {
        METRIC_NODE_COUNT => "Number of nodes in the group",
        METRIC_MEMORY_TOTAL => "Memory capacity of the group in bytes",
        METRIC_MEMORY_REQUESTS => "Memory requested by active pods in bytes",
        METRIC_MEMORY_LIMITS => "Memory limits of active pods in bytes",
        METRIC_CPU_TOTAL => "CPU capacity of the group in millicores",
        METRIC_CPU_REQUESTS => "CPU requested by active pods in millicores",
        METRIC_CPU_LIMITS => "CPU limits of active pods in millicores",
        _ => "Cluster allocation gauge",
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_name: String,
}

impl StructuredLogger {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, delay_secs: u64, label_selector: &str) {
        info!(
            event = "agent_started",
            cluster = %self.cluster_name,
            agent_version = %version,
            reporting_delay_secs = delay_secs,
            label_selector = %label_selector,
            "Allocation agent started"
        );
    }

    /// Log a successful collection cycle
    pub fn log_cycle_completed(&self, nodes: usize, groups: usize, samples: usize, elapsed_ms: u128) {
        info!(
            event = "cycle_completed",
            cluster = %self.cluster_name,
            nodes = nodes,
            groups = groups,
            samples = samples,
            elapsed_ms = elapsed_ms as u64,
            "Collection cycle completed"
        );
    }

    /// Log a failed collection cycle
    pub fn log_cycle_failed(&self, error: &CollectError, elapsed_ms: u128) {
        warn!(
            event = "cycle_failed",
            cluster = %self.cluster_name,
            error = %error,
            listing_failure = error.is_listing_failure(),
            elapsed_ms = elapsed_ms as u64,
            "Collection cycle failed, keeping previous samples"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            cluster = %self.cluster_name,
            reason = %reason,
            "Allocation agent shutting down"
        );
    }
}
