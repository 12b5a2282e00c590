//! Export of pass results
//!
//! Reporters receive each resource type's findings once per completed pass,
//! then the whole pass report for end-of-run exports. A failing reporter is
//! logged by the caller and retried naturally on the next pass.

mod gauge;
mod records;
mod sheets;

pub use gauge::GaugeReporter;
pub use records::{CsvReporter, RECORD_LOG_FILE};
pub use sheets::{sheet_file_name, SheetLayout};

use crate::aggregator::FindingSet;
use crate::models::{MetricBundle, ResourceType};
use crate::scan::PassReport;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure of an export sink
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("export I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Sink for findings
pub trait Reporter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Export one type's findings from a completed pass
    fn flush(
        &self,
        resource_type: ResourceType,
        findings: &FindingSet,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), ReportError>;

    /// Called once after every type of the pass has been flushed
    fn finish_pass(&self, _report: &PassReport) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Render a metric for export; absent samples render empty
pub(crate) fn metric_cell(bundle: &MetricBundle, metric_name: &str) -> String {
    bundle
        .value(metric_name)
        .map(|v| v.to_string())
        .unwrap_or_default()
}
