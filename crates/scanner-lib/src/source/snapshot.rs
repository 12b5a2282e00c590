//! JSON file-backed inventory and metric source
//!
//! The snapshot file is re-read on every `list` call so an external exporter
//! can refresh it between passes. Metric lookups use the most recently read
//! snapshot; a metric with no record means no datapoints.

use super::{async_trait, MetricQuery, MetricSource, ResourceInventory, SourceError};
use crate::models::{ResourceDescriptor, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// One metric statistic for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub metric: String,
    pub value: f64,
}

/// On-disk snapshot document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
}

type MetricIndex = HashMap<(String, String, String), f64>;

fn index_metrics(snapshot: &Snapshot) -> MetricIndex {
    snapshot
        .metrics
        .iter()
        .map(|m| {
            (
                (
                    m.resource_type.namespace().to_string(),
                    m.resource_id.clone(),
                    m.metric.clone(),
                ),
                m.value,
            )
        })
        .collect()
}

/// Serves inventory and metrics from a snapshot file
pub struct SnapshotSource {
    path: PathBuf,
    metrics: RwLock<MetricIndex>,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metrics: RwLock::new(MetricIndex::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Snapshot, SourceError> {
        let raw = tokio::fs::read(&self.path).await.map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;

        *self.metrics.write().await = index_metrics(&snapshot);
        debug!(
            path = %self.path.display(),
            resources = snapshot.resources.len(),
            metrics = snapshot.metrics.len(),
            "Loaded inventory snapshot"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl ResourceInventory for SnapshotSource {
    async fn list(
        &self,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceDescriptor>, SourceError> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .resources
            .into_iter()
            .filter(|r| r.resource_type == resource_type)
            .collect())
    }
}

#[async_trait]
impl MetricSource for SnapshotSource {
    async fn statistic(&self, query: &MetricQuery<'_>) -> Result<Option<f64>, SourceError> {
        let key = (
            query.namespace.to_string(),
            query.resource_id.to_string(),
            query.spec.name.to_string(),
        );
        Ok(self.metrics.read().await.get(&key).copied())
    }
}
