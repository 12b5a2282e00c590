//! Observability infrastructure for the orphan scanner
//!
//! Provides:
//! - Prometheus gauges for flagged resources, one series family per type
//! - Operational metrics (pass duration, scanned resources, error counts)
//! - Structured JSON logging with tracing

use crate::models::{ResourceType, Verdict};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_gauge, register_int_gauge_vec, GaugeVec,
    Histogram, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Pass duration buckets (in seconds); a pass spans many remote calls
const PASS_DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Label names of each orphan gauge family; the first label is the resource id
pub mod labels {
    pub const EC2: &[&str] = &[
        "instance_id",
        "DiskReadOps",
        "DiskWriteOps",
        "CPU_Util",
        "DiskReadBytes",
        "DiskWriteBytes",
        "StatusCheckFailed",
    ];
    pub const VOLUME: &[&str] = &["volume_id", "ReadOps", "WriteOps", "IdleTime", "BurstBalance"];
    pub const ELB: &[&str] = &["elb_id", "HealthyHostCount", "RequestCount"];
    pub const EIP: &[&str] = &["eip_id"];
    pub const RDS: &[&str] = &[
        "db_id",
        "DBConnections",
        "ReadLatency",
        "WriteLatency",
        "BurstBalance",
        "FreeableMem",
        "FreeStorageSpace",
        "cpuSurplus",
        "ebsByteBalance",
        "ebsIOBalance",
    ];
}

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScannerMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ScannerMetricsInner {
    orphaned_ec2_instances: GaugeVec,
    orphaned_volumes: GaugeVec,
    orphaned_elb: GaugeVec,
    potentially_orphaned_elb: GaugeVec,
    orphaned_eips: GaugeVec,
    orphaned_db: GaugeVec,
    region_info: GaugeVec,
    pass_duration_seconds: Histogram,
    resources_scanned: IntGaugeVec,
    findings: IntGaugeVec,
    fetch_errors: IntGauge,
    export_errors: IntGauge,
    passes: IntGauge,
}

impl ScannerMetricsInner {
    fn new() -> Self {
        Self {
            orphaned_ec2_instances: register_gauge_vec!(
                "orphaned_ec2_instances",
                "Orphaned EC2 instances with their metric snapshot",
                labels::EC2
            )
            .expect("Failed to register orphaned_ec2_instances"),

            orphaned_volumes: register_gauge_vec!(
                "orphaned_volumes",
                "Orphaned EBS volumes with their metric snapshot",
                labels::VOLUME
            )
            .expect("Failed to register orphaned_volumes"),

            orphaned_elb: register_gauge_vec!(
                "orphaned_elb",
                "Orphaned load balancers with their metric snapshot",
                labels::ELB
            )
            .expect("Failed to register orphaned_elb"),

            potentially_orphaned_elb: register_gauge_vec!(
                "potentially_orphaned_elb",
                "Load balancers with low but non-zero traffic",
                labels::ELB
            )
            .expect("Failed to register potentially_orphaned_elb"),

            orphaned_eips: register_gauge_vec!(
                "orphaned_eips",
                "Elastic IPs not associated with any instance",
                labels::EIP
            )
            .expect("Failed to register orphaned_eips"),

            orphaned_db: register_gauge_vec!(
                "orphaned_db",
                "Orphaned RDS instances with their metric snapshot",
                labels::RDS
            )
            .expect("Failed to register orphaned_db"),

            region_info: register_gauge_vec!(
                "aws_region_name",
                "Region scanned by this process",
                &["aws_region"]
            )
            .expect("Failed to register aws_region_name"),

            pass_duration_seconds: register_histogram!(
                "orphan_scanner_pass_duration_seconds",
                "Time spent on one full detection pass",
                PASS_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_duration_seconds"),

            resources_scanned: register_int_gauge_vec!(
                "orphan_scanner_resources_scanned",
                "Resources classified in the last completed pass",
                &["resource_type"]
            )
            .expect("Failed to register resources_scanned"),

            findings: register_int_gauge_vec!(
                "orphan_scanner_findings",
                "Findings produced in the last completed pass",
                &["resource_type", "verdict"]
            )
            .expect("Failed to register findings"),

            fetch_errors: register_int_gauge!(
                "orphan_scanner_fetch_errors_total",
                "Total number of inventory or metric fetch failures"
            )
            .expect("Failed to register fetch_errors"),

            export_errors: register_int_gauge!(
                "orphan_scanner_export_errors_total",
                "Total number of reporter export failures"
            )
            .expect("Failed to register export_errors"),

            passes: register_int_gauge!(
                "orphan_scanner_passes_total",
                "Total number of completed detection passes"
            )
            .expect("Failed to register passes"),
        }
    }

    fn orphan_gauge(&self, resource_type: ResourceType, verdict: Verdict) -> &GaugeVec {
        match (resource_type, verdict) {
            (ResourceType::Ec2, _) => &self.orphaned_ec2_instances,
            (ResourceType::EbsVolume, _) => &self.orphaned_volumes,
            (ResourceType::Elb, Verdict::Orphaned) => &self.orphaned_elb,
            (ResourceType::Elb, Verdict::PotentiallyOrphaned) => &self.potentially_orphaned_elb,
            (ResourceType::Eip, _) => &self.orphaned_eips,
            (ResourceType::Rds, _) => &self.orphaned_db,
        }
    }
}

/// Label names for the gauge family of a resource type
pub fn orphan_labels(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Ec2 => labels::EC2,
        ResourceType::EbsVolume => labels::VOLUME,
        ResourceType::Elb => labels::ELB,
        ResourceType::Eip => labels::EIP,
        ResourceType::Rds => labels::RDS,
    }
}

/// Scanner metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScannerMetrics {
    _private: (),
}

impl Default for ScannerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScannerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScannerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Drop every series of a type so the next flush reflects one pass only
    pub fn reset_orphaned(&self, resource_type: ResourceType) {
        let inner = self.inner();
        inner.orphan_gauge(resource_type, Verdict::Orphaned).reset();
        if resource_type == ResourceType::Elb {
            inner.potentially_orphaned_elb.reset();
        }
    }

    /// Mark one flagged resource; `values` follow [`orphan_labels`]
    pub fn set_flagged(&self, resource_type: ResourceType, verdict: Verdict, values: &[&str]) {
        let gauge = self.inner().orphan_gauge(resource_type, verdict);
        match gauge.get_metric_with_label_values(values) {
            Ok(g) => g.set(1.0),
            Err(e) => warn!(
                resource_type = %resource_type,
                error = %e,
                "Label values do not match gauge layout"
            ),
        }
    }

    /// Publish the scanned region with value 1
    pub fn set_region(&self, region: &str) {
        self.inner().region_info.reset();
        self.inner()
            .region_info
            .with_label_values(&[region])
            .set(1.0);
    }

    pub fn observe_pass_duration(&self, duration_secs: f64) {
        self.inner().pass_duration_seconds.observe(duration_secs);
    }

    pub fn set_resources_scanned(&self, resource_type: ResourceType, count: i64) {
        self.inner()
            .resources_scanned
            .with_label_values(&[resource_type.as_str()])
            .set(count);
    }

    pub fn set_findings(&self, resource_type: ResourceType, verdict: Verdict, count: i64) {
        let verdict = verdict.to_string();
        self.inner()
            .findings
            .with_label_values(&[resource_type.as_str(), verdict.as_str()])
            .set(count);
    }

    pub fn inc_fetch_errors(&self) {
        self.inner().fetch_errors.inc();
    }

    pub fn inc_export_errors(&self) {
        self.inner().export_errors.inc();
    }

    pub fn inc_passes(&self) {
        self.inner().passes.inc();
    }
}

/// Structured logger for scanner events
///
/// Provides consistent JSON-formatted logging for passes, flagged
/// resources and collaborator failures.
#[derive(Clone)]
pub struct StructuredLogger {
    region: String,
}

impl StructuredLogger {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "scanner_started",
            region = %self.region,
            scanner_version = %version,
            interval_secs = interval_secs,
            "Orphan scanner started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "scanner_shutdown",
            region = %self.region,
            reason = %reason,
            "Orphan scanner shutting down"
        );
    }

    pub fn log_pass_started(&self, pass: u64) {
        info!(
            event = "pass_started",
            region = %self.region,
            pass = pass,
            "Starting detection pass"
        );
    }

    pub fn log_pass_completed(
        &self,
        pass: u64,
        scanned: usize,
        findings: usize,
        skipped: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "pass_completed",
            region = %self.region,
            pass = pass,
            resources_scanned = scanned,
            findings = findings,
            resources_skipped = skipped,
            elapsed_ms = elapsed_ms as u64,
            "Detection pass complete"
        );
    }

    pub fn log_flagged(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        verdict: Verdict,
        reason_code: &str,
    ) {
        info!(
            event = "resource_flagged",
            region = %self.region,
            resource_type = %resource_type,
            resource_id = %resource_id,
            verdict = %verdict,
            reason = %reason_code,
            "Resource flagged"
        );
    }

    pub fn log_fetch_failed(
        &self,
        resource_type: ResourceType,
        resource_id: Option<&str>,
        error: &str,
    ) {
        warn!(
            event = "fetch_failed",
            region = %self.region,
            resource_type = %resource_type,
            resource_id = ?resource_id,
            error = %error,
            "Fetch failed, skipping for this pass"
        );
    }

    pub fn log_export_failed(
        &self,
        reporter: &str,
        resource_type: Option<ResourceType>,
        error: &str,
    ) {
        warn!(
            event = "export_failed",
            region = %self.region,
            reporter = %reporter,
            resource_type = ?resource_type.map(|t| t.as_str()),
            error = %error,
            "Export failed, will retry next pass"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_metrics_creation() {
        // Metrics live in the default registry; repeated handles share it.
        let metrics = ScannerMetrics::new();
        let again = ScannerMetrics::new();

        metrics.observe_pass_duration(12.0);
        metrics.set_resources_scanned(ResourceType::Ec2, 4);
        metrics.set_findings(ResourceType::Ec2, Verdict::Orphaned, 1);
        again.inc_fetch_errors();
        again.inc_export_errors();
        again.inc_passes();
        metrics.set_region("eu-west-1");

        let families = prometheus::gather();
        assert!(families.iter().any(|f| f.get_name() == "aws_region_name"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "orphan_scanner_pass_duration_seconds"));
    }

    #[test]
    fn test_orphan_labels_start_with_id() {
        for ty in ResourceType::SCAN_ORDER {
            let names = orphan_labels(ty);
            assert!(names[0].ends_with("_id"));
        }
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("eu-west-1");
        assert_eq!(logger.region(), "eu-west-1");
    }
}
