//! Cloud-side collaborators: resource inventory and metric statistics
//!
//! The scanner does not talk to the provider API directly. It consumes two
//! capability traits, and ships a JSON snapshot implementation of both.

mod snapshot;

pub use snapshot::{MetricRecord, Snapshot, SnapshotSource};

pub use async_trait::async_trait;

use crate::classifier::MetricSpec;
use crate::models::{MetricBundle, MetricSample, ResourceDescriptor, ResourceType};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Failure of an inventory or metric call
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read inventory snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed inventory snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("{0}")]
    Other(String),
}

/// Enumerates resources of one type with their static attributes
#[async_trait]
pub trait ResourceInventory: Send + Sync {
    async fn list(
        &self,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceDescriptor>, SourceError>;
}

/// A metric statistic over a lookback window
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery<'a> {
    pub namespace: &'static str,
    pub resource_id: &'a str,
    pub spec: MetricSpec,
    pub lookback: Duration,
}

/// Returns time-windowed statistics for resources
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// `Ok(None)` when the window holds no datapoints
    async fn statistic(&self, query: &MetricQuery<'_>) -> Result<Option<f64>, SourceError>;
}

/// Outcome of fetching all metrics for one resource
#[derive(Debug)]
pub enum BundleFetch {
    Complete(MetricBundle),
    Cancelled,
}

/// Fetch every metric in `specs` for `resource`, one call per metric
///
/// A call exceeding `timeout` is recorded as an absent sample. Any source
/// error aborts the fetch so the caller can skip the resource.
pub async fn fetch_bundle(
    source: &dyn MetricSource,
    resource: &ResourceDescriptor,
    specs: &[MetricSpec],
    lookback: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<BundleFetch, SourceError> {
    let mut bundle = MetricBundle::new();

    for spec in specs {
        if cancel.is_cancelled() {
            return Ok(BundleFetch::Cancelled);
        }

        let query = MetricQuery {
            namespace: resource.resource_type.namespace(),
            resource_id: &resource.id,
            spec: *spec,
            lookback,
        };

        let sample = match tokio::time::timeout(timeout, source.statistic(&query)).await {
            Ok(Ok(Some(value))) => MetricSample::present(spec.name, spec.statistic, value),
            Ok(Ok(None)) => MetricSample::absent(spec.name, spec.statistic),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    resource_id = %resource.id,
                    metric = spec.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Metric request timed out, treating as no data"
                );
                MetricSample::absent(spec.name, spec.statistic)
            }
        };
        bundle.insert(sample);
    }

    Ok(BundleFetch::Complete(bundle))
}
