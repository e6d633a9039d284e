//! Periodic collection loop
//!
//! Runs one cycle at a time on a fixed delay: the next cycle starts
//! `delay` after the previous one finished, so cycles never overlap. Each
//! cycle is bounded by `timeout`.

use crate::allocation::{project, ProjectionConfig, SnapshotBuilder};
use crate::error::CollectError;
use crate::health::{components, HealthRegistry};
use crate::observability::{AgentMetrics, SampleSink, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Pause between the end of one cycle and the start of the next (default: 5 minutes)
    pub delay: Duration,
    /// Deadline for a single cycle (default: 30 seconds)
    pub timeout: Duration,
    /// Metric naming for projected samples
    pub projection: ProjectionConfig,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
            projection: ProjectionConfig::default(),
        }
    }
}

/// Outcome of a successful cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub nodes: usize,
    pub groups: usize,
    pub samples: usize,
    pub elapsed: Duration,
}

/// Loop that periodically builds a snapshot and publishes its samples
pub struct CollectionLoop {
    builder: SnapshotBuilder,
    sink: Arc<dyn SampleSink>,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    config: CollectionConfig,
}

impl CollectionLoop {
    pub fn new(
        builder: SnapshotBuilder,
        sink: Arc<dyn SampleSink>,
        health: HealthRegistry,
        logger: StructuredLogger,
        config: CollectionConfig,
    ) -> Self {
        Self {
            builder,
            sink,
            health,
            metrics: AgentMetrics::new(),
            logger,
            config,
        }
    }

    /// Run until the shutdown channel fires
    ///
    /// An in-flight cycle is dropped on shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            delay_secs = self.config.delay.as_secs(),
            timeout_secs = self.config.timeout.as_secs(),
            "Starting allocation collection loop"
        );

        loop {
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = sleep(self.config.delay) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Shutting down allocation collection loop");
    }

    /// Run a single cycle and publish its samples
    ///
    /// On failure nothing is published, so the previous samples stay
    /// exported until a later cycle succeeds.
    pub async fn run_cycle(&self) -> Result<CycleReport, CollectError> {
        let start = Instant::now();

        let outcome = match timeout(self.config.timeout, self.builder.build()).await {
            Ok(result) => result,
            Err(_) => Err(CollectError::Timeout(self.config.timeout)),
        };
        let elapsed = start.elapsed();
        self.metrics.observe_cycle_latency(elapsed.as_secs_f64());

        match outcome {
            Ok(snapshot) => {
                let samples = project(&snapshot, &self.config.projection);
                self.sink.publish(&samples, snapshot.collected_at());

                let report = CycleReport {
                    nodes: snapshot.totals().node_count,
                    groups: snapshot.groups().map_or(0, |g| g.len()),
                    samples: samples.len(),
                    elapsed,
                };

                self.metrics.set_nodes_observed(report.nodes as i64);
                self.metrics.set_groups_observed(report.groups as i64);
                self.metrics
                    .set_last_success_timestamp(snapshot.collected_at().timestamp());
                self.health.set_healthy(components::COLLECTOR).await;
                self.health.set_healthy(components::KUBE_API).await;
                self.health
                    .record_cycle_success(snapshot.collected_at().timestamp())
                    .await;
                self.health.set_ready(true).await;

                self.logger.log_cycle_completed(
                    report.nodes,
                    report.groups,
                    report.samples,
                    elapsed.as_millis(),
                );
                Ok(report)
            }
            Err(e) => {
                self.metrics.inc_cycle_errors();
                self.record_failure(&e).await;
                self.logger.log_cycle_failed(&e, elapsed.as_millis());
                Err(e)
            }
        }
    }

    async fn record_failure(&self, error: &CollectError) {
        let message = error.to_string();
        if let CollectError::Selector { .. } = error {
            // A malformed selector fails every cycle until reconfigured
            self.health
                .set_unhealthy(components::COLLECTOR, message)
                .await;
            return;
        }

        if error.is_listing_failure() {
            self.health
                .set_degraded(components::KUBE_API, message.clone())
                .await;
        }
        self.health.set_degraded(components::COLLECTOR, message).await;
        debug!(error = ?error, "Recorded cycle failure in health registry");
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    builder: Option<SnapshotBuilder>,
    sink: Option<Arc<dyn SampleSink>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            builder: None,
            sink: None,
            health: None,
            logger: None,
            config: CollectionConfig::default(),
        }
    }

    /// Set the snapshot builder
    pub fn snapshot_builder(mut self, builder: SnapshotBuilder) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Set where projected samples go
    pub fn sink(mut self, sink: Arc<dyn SampleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn health_registry(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the delay between cycles
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Set the per-cycle timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn projection(mut self, projection: ProjectionConfig) -> Self {
        self.config.projection = projection;
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<CollectionLoop> {
        let builder = self
            .builder
            .ok_or_else(|| anyhow::anyhow!("Snapshot builder is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Sample sink is required"))?;

        Ok(CollectionLoop::new(
            builder,
            sink,
            self.health.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            self.config,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
