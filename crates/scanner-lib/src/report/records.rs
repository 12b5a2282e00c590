//! CSV export: an append-only record log plus one sheet per resource type

use super::sheets::{sheet_file_name, SheetLayout};
use super::{ReportError, Reporter};
use crate::aggregator::FindingSet;
use crate::models::{Finding, ResourceType};
use crate::scan::PassReport;
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only log of every finding from every pass
pub const RECORD_LOG_FILE: &str = "orphaned_resources.csv";

const RECORD_HEADERS: [&str; 6] = [
    "scanned_at",
    "resource_type",
    "resource_id",
    "verdict",
    "reason_code",
    "metrics",
];

/// Writes findings as CSV files under an output directory
#[derive(Debug, Clone)]
pub struct CsvReporter {
    output_dir: PathBuf,
}

impl CsvReporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn record_log_path(&self) -> PathBuf {
        self.output_dir.join(RECORD_LOG_FILE)
    }

    pub fn sheet_path(&self, resource_type: ResourceType) -> PathBuf {
        self.output_dir.join(sheet_file_name(resource_type))
    }

    fn write_sheet(
        &self,
        resource_type: ResourceType,
        findings: &FindingSet,
    ) -> Result<(), ReportError> {
        let layout = SheetLayout::for_type(resource_type);
        let path = self.sheet_path(resource_type);
        let mut writer = csv::Writer::from_path(&path)?;

        writer.write_record(layout.headers())?;
        for finding in findings.iter() {
            writer.write_record(layout.row(finding))?;
        }
        writer.flush()?;

        debug!(path = %path.display(), rows = findings.len(), "Wrote export sheet");
        Ok(())
    }
}

fn metrics_summary(finding: &Finding) -> String {
    finding
        .metrics
        .iter()
        .map(|s| {
            if s.present {
                format!("{}={}", s.metric_name, s.value)
            } else {
                format!("{}=", s.metric_name)
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn is_new_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

impl Reporter for CsvReporter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn flush(
        &self,
        resource_type: ResourceType,
        findings: &FindingSet,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.record_log_path();
        let write_header = is_new_file(&path);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if write_header {
            writer.write_record(RECORD_HEADERS)?;
        }

        let scanned_at = scanned_at.to_rfc3339();
        for finding in findings.iter() {
            let verdict = finding.verdict.to_string();
            let metrics = metrics_summary(finding);
            writer.write_record([
                scanned_at.as_str(),
                resource_type.as_str(),
                finding.resource_id.as_str(),
                verdict.as_str(),
                finding.reason_code.as_str(),
                metrics.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn finish_pass(&self, report: &PassReport) -> Result<(), ReportError> {
        std::fs::create_dir_all(&self.output_dir)?;
        for outcome in &report.outcomes {
            self.write_sheet(outcome.resource_type, &outcome.findings)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, MetricBundle, MetricSample, Statistic, Verdict};
    use crate::scan::TypeOutcome;
    use tempfile::TempDir;

    fn elb_finding(id: &str, verdict: Verdict) -> Finding {
        Finding {
            resource_type: ResourceType::Elb,
            resource_id: id.to_string(),
            verdict,
            reason_code: "low-request-count".to_string(),
            metrics: MetricBundle::new()
                .with(MetricSample::present("HealthyHostCount", Statistic::Average, 2.0))
                .with(MetricSample::absent("RequestCount", Statistic::Sum)),
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_flush_appends_records_with_single_header() {
        let dir = TempDir::new().unwrap();
        let reporter = CsvReporter::new(dir.path());
        let set: FindingSet = vec![elb_finding("app/a/1", Verdict::PotentiallyOrphaned)]
            .into_iter()
            .collect();

        reporter.flush(ResourceType::Elb, &set, Utc::now()).unwrap();
        reporter.flush(ResourceType::Elb, &set, Utc::now()).unwrap();

        let mut reader = csv::Reader::from_path(reporter.record_log_path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(2), Some("resource_id"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some("ELB"));
        assert_eq!(rows[0].get(3), Some("potentially_orphaned"));
        assert_eq!(rows[0].get(5), Some("HealthyHostCount=2;RequestCount="));
    }

    #[test]
    fn test_finish_pass_writes_sheet_per_classified_type() {
        let dir = TempDir::new().unwrap();
        let reporter = CsvReporter::new(dir.path().join("exports"));
        let now = Utc::now();
        let report = PassReport {
            started_at: now,
            finished_at: now,
            outcomes: vec![
                TypeOutcome {
                    resource_type: ResourceType::Elb,
                    scanned: 2,
                    skipped: 0,
                    findings: vec![
                        elb_finding("app/a/1", Verdict::Orphaned),
                        elb_finding("app/b/2", Verdict::PotentiallyOrphaned),
                    ]
                    .into_iter()
                    .collect(),
                },
                TypeOutcome {
                    resource_type: ResourceType::Eip,
                    scanned: 0,
                    skipped: 0,
                    findings: FindingSet::new(),
                },
            ],
            failed_types: vec![ResourceType::Rds],
        };

        reporter.finish_pass(&report).unwrap();

        let mut reader = csv::Reader::from_path(reporter.sheet_path(ResourceType::Elb)).unwrap();
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(String::from)
            .collect();
        assert_eq!(
            headers,
            vec!["elbID", "HealthyHostCount", "RequestCount", "Verdict", "Reason"]
        );
        assert_eq!(reader.records().count(), 2);

        // an empty type still gets a sheet with headers
        let eip = std::fs::read_to_string(reporter.sheet_path(ResourceType::Eip)).unwrap();
        assert_eq!(eip.trim(), "EIP,Status,Verdict,Reason");

        assert!(!reporter.sheet_path(ResourceType::Rds).exists());
    }
}
