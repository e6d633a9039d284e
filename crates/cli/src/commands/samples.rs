//! `samples` command: the gauges a cycle would export

use allocation_lib::allocation::{dimensions, project, Sample};
use allocation_lib::{ClusterSource, ProjectionConfig, SnapshotOptions};
use anyhow::Result;
use std::sync::Arc;
use tabled::Tabled;

use super::snapshot::collect;
use crate::output::{print_json, print_table, OutputFormat};

/// Row for the samples table
#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Instance Type")]
    instance_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Tenant")]
    tenant: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&Sample> for SampleRow {
    fn from(sample: &Sample) -> Self {
        let dimension = |name: &str| {
            sample
                .dimensions
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| "-".to_string())
        };
        Self {
            metric: sample.metric_name.clone(),
            role: dimension(dimensions::NODE_ROLE),
            instance_type: dimension(dimensions::INSTANCE_TYPE),
            size: dimension(dimensions::INSTANCE_SIZE),
            tenant: dimension(dimensions::TENANT),
            value: format!("{}", sample.value),
        }
    }
}

/// Show the samples projected from one cycle
pub async fn show_samples(
    source: Arc<dyn ClusterSource>,
    options: SnapshotOptions,
    projection: ProjectionConfig,
    format: OutputFormat,
) -> Result<()> {
    // Samples are derived from groups
    let options = SnapshotOptions {
        compute_group_totals: true,
        ..options
    };
    let snapshot = collect(source, options).await?;
    let samples = project(&snapshot, &projection);

    match format {
        OutputFormat::Json => print_json(&samples)?,
        OutputFormat::Table => {
            let rows: Vec<SampleRow> = samples.iter().map(SampleRow::from).collect();
            print_table(&rows, "No samples: no eligible nodes");
        }
    }

    Ok(())
}
