//! Prometheus gauge export
//!
//! One gauge family per resource type, one series per flagged resource with
//! value 1. Label values carry the resource's metric snapshot.

use super::{metric_cell, ReportError, Reporter};
use crate::aggregator::FindingSet;
use crate::classifier::metric_names::*;
use crate::models::{Finding, ResourceType, Verdict};
use crate::observability::ScannerMetrics;
use chrono::{DateTime, Utc};

/// Metrics backing each label after the id, in label order
fn label_metrics(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Ec2 => &[
            DISK_READ_OPS,
            DISK_WRITE_OPS,
            CPU_UTILIZATION,
            DISK_READ_BYTES,
            DISK_WRITE_BYTES,
            STATUS_CHECK_FAILED,
        ],
        ResourceType::EbsVolume => &[
            VOLUME_READ_OPS,
            VOLUME_WRITE_OPS,
            VOLUME_IDLE_TIME,
            BURST_BALANCE,
        ],
        ResourceType::Elb => &[HEALTHY_HOST_COUNT, REQUEST_COUNT],
        ResourceType::Eip => &[],
        ResourceType::Rds => &[
            DATABASE_CONNECTIONS,
            READ_LATENCY,
            WRITE_LATENCY,
            BURST_BALANCE,
            FREEABLE_MEMORY,
            FREE_STORAGE_SPACE,
            CPU_SURPLUS_CREDIT_BALANCE,
            EBS_BYTE_BALANCE,
            EBS_IO_BALANCE,
        ],
    }
}

/// Label values for a finding, matching [`crate::observability::orphan_labels`]
pub(crate) fn label_values(finding: &Finding) -> Vec<String> {
    std::iter::once(finding.resource_id.clone())
        .chain(
            label_metrics(finding.resource_type)
                .iter()
                .map(|name| metric_cell(&finding.metrics, name)),
        )
        .collect()
}

/// Publishes findings as `orphaned_*` gauges
#[derive(Clone, Default)]
pub struct GaugeReporter {
    metrics: ScannerMetrics,
}

impl GaugeReporter {
    pub fn new(metrics: ScannerMetrics) -> Self {
        Self { metrics }
    }
}

impl Reporter for GaugeReporter {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn flush(
        &self,
        resource_type: ResourceType,
        findings: &FindingSet,
        _scanned_at: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        self.metrics.reset_orphaned(resource_type);

        for finding in findings.iter() {
            let values = label_values(finding);
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            self.metrics.set_flagged(resource_type, finding.verdict, &refs);
        }

        let orphaned = findings.orphaned_count();
        self.metrics
            .set_findings(resource_type, Verdict::Orphaned, orphaned as i64);
        self.metrics.set_findings(
            resource_type,
            Verdict::PotentiallyOrphaned,
            (findings.len() - orphaned) as i64,
        );
        Ok(())
    }
}
