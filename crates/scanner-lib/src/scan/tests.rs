use super::*;
use crate::classifier::{metric_names, reasons, Thresholds, UNASSOCIATED_ADDRESS};
use crate::health::ComponentStatus;
use crate::models::{attrs, Verdict};
use crate::report::ReportError;
use crate::source::{async_trait, MetricQuery, SourceError};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryInventory {
    resources: HashMap<ResourceType, Vec<ResourceDescriptor>>,
    failing: Vec<ResourceType>,
}

impl MemoryInventory {
    fn with(mut self, resource: ResourceDescriptor) -> Self {
        self.resources
            .entry(resource.resource_type)
            .or_default()
            .push(resource);
        self
    }
}

#[async_trait]
impl ResourceInventory for MemoryInventory {
    async fn list(
        &self,
        resource_type: ResourceType,
    ) -> Result<Vec<ResourceDescriptor>, SourceError> {
        if self.failing.contains(&resource_type) {
            return Err(SourceError::Other("AccessDenied".into()));
        }
        Ok(self
            .resources
            .get(&resource_type)
            .cloned()
            .unwrap_or_default())
    }
}

type Responder = Box<dyn Fn(&MetricQuery<'_>) -> Result<Option<f64>, SourceError> + Send + Sync>;

/// Metric source answering from a closure
struct FnMetrics(Responder);

#[async_trait]
impl MetricSource for FnMetrics {
    async fn statistic(&self, query: &MetricQuery<'_>) -> Result<Option<f64>, SourceError> {
        (self.0)(query)
    }
}

/// Idle resources report zero everywhere, busy ones look healthy,
/// load balancers have no data at all
fn usage_metrics() -> FnMetrics {
    FnMetrics(Box::new(|query: &MetricQuery<'_>| {
        if query.resource_id.starts_with("app/") {
            return Ok(None);
        }
        if query.resource_id.starts_with("busy") {
            let value = if query.spec.name == metric_names::STATUS_CHECK_FAILED {
                0.0
            } else {
                100.0
            };
            return Ok(Some(value));
        }
        if query.resource_id.starts_with("broken") {
            return Err(SourceError::Throttled("Rate exceeded".into()));
        }
        Ok(Some(0.0))
    }))
}

#[derive(Default)]
struct RecordingReporter {
    flushes: Mutex<Vec<(ResourceType, usize)>>,
    finished: Mutex<usize>,
}

impl Reporter for RecordingReporter {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn flush(
        &self,
        resource_type: ResourceType,
        findings: &FindingSet,
        _scanned_at: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        self.flushes
            .lock()
            .unwrap()
            .push((resource_type, findings.len()));
        Ok(())
    }

    fn finish_pass(&self, _report: &PassReport) -> Result<(), ReportError> {
        *self.finished.lock().unwrap() += 1;
        Ok(())
    }
}

struct BrokenReporter;

impl Reporter for BrokenReporter {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn flush(
        &self,
        _resource_type: ResourceType,
        _findings: &FindingSet,
        _scanned_at: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        Err(ReportError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only file system",
        )))
    }
}

fn fleet() -> MemoryInventory {
    MemoryInventory::default()
        .with(ResourceDescriptor::new(ResourceType::Eip, "52.0.0.1"))
        .with(ResourceDescriptor::new(ResourceType::Eip, "52.0.0.2"))
        .with(
            ResourceDescriptor::new(ResourceType::Ec2, "i-idle")
                .with_text(attrs::PUBLIC_IP, "52.0.0.1"),
        )
        .with(ResourceDescriptor::new(ResourceType::Ec2, "busy-1"))
        .with(ResourceDescriptor::new(ResourceType::Elb, "app/web/1"))
}

fn runner(inventory: MemoryInventory, health: HealthRegistry) -> PassRunner {
    PassRunner::new(
        Arc::new(inventory),
        Arc::new(usage_metrics()),
        RuleBook::new(Thresholds::default()),
        PassSettings::default(),
        StructuredLogger::new("eu-west-1"),
    )
    .with_health(health)
}

#[tokio::test]
async fn test_pass_classifies_every_type_in_scan_order() {
    let reporter = Arc::new(RecordingReporter::default());
    let runner = runner(fleet(), HealthRegistry::new()).with_reporter(reporter.clone());

    let report = runner.run_pass(&CancellationToken::new()).await.unwrap();

    let order: Vec<_> = report.outcomes.iter().map(|o| o.resource_type).collect();
    assert_eq!(order, ResourceType::SCAN_ORDER.to_vec());
    assert!(report.failed_types.is_empty());

    let eip = report.findings(ResourceType::Eip).unwrap();
    assert_eq!(eip.len(), 1);
    let unbound = eip.get(ResourceType::Eip, "52.0.0.2").unwrap();
    assert_eq!(unbound.reason_code, UNASSOCIATED_ADDRESS);

    let ec2 = report.findings(ResourceType::Ec2).unwrap();
    assert_eq!(ec2.len(), 1);
    assert_eq!(
        ec2.get(ResourceType::Ec2, "i-idle").unwrap().reason_code,
        reasons::DISK_READ_OPS_FLOOR
    );

    let elb = report
        .findings(ResourceType::Elb)
        .unwrap()
        .get(ResourceType::Elb, "app/web/1")
        .unwrap();
    assert_eq!(elb.verdict, Verdict::Orphaned);
    assert_eq!(elb.reason_code, reasons::NO_HEALTHY_HOSTS);

    assert_eq!(report.total_scanned(), 5);
    assert_eq!(report.total_findings(), 3);
}

#[tokio::test]
async fn test_each_type_flushed_once_then_pass_finished() {
    let reporter = Arc::new(RecordingReporter::default());
    let runner = runner(fleet(), HealthRegistry::new()).with_reporter(reporter.clone());

    runner.run_pass(&CancellationToken::new()).await.unwrap();

    let flushes = reporter.flushes.lock().unwrap().clone();
    assert_eq!(
        flushes,
        vec![
            (ResourceType::Eip, 1),
            (ResourceType::Ec2, 1),
            (ResourceType::EbsVolume, 0),
            (ResourceType::Elb, 1),
            (ResourceType::Rds, 0),
        ]
    );
    assert_eq!(*reporter.finished.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_fetch_failure_skips_only_that_resource() {
    let health = HealthRegistry::new();
    let inventory = fleet().with(ResourceDescriptor::new(ResourceType::Ec2, "broken-1"));
    let runner = runner(inventory, health.clone());

    let report = runner.run_pass(&CancellationToken::new()).await.unwrap();

    let ec2 = report
        .outcomes
        .iter()
        .find(|o| o.resource_type == ResourceType::Ec2)
        .unwrap();
    assert_eq!(ec2.scanned, 2);
    assert_eq!(ec2.skipped, 1);
    assert!(ec2.findings.get(ResourceType::Ec2, "i-idle").is_some());
    assert!(ec2.findings.get(ResourceType::Ec2, "broken-1").is_none());

    let status = health.health().await;
    assert_eq!(
        status.components[components::METRIC_SOURCE].status,
        ComponentStatus::Degraded
    );
    assert_eq!(status.last_pass.unwrap().resources_skipped, 1);
}

#[tokio::test]
async fn test_inventory_failure_leaves_type_out_of_export() {
    let reporter = Arc::new(RecordingReporter::default());
    let inventory = MemoryInventory {
        failing: vec![ResourceType::Rds],
        ..fleet()
    };
    let runner = runner(inventory, HealthRegistry::new()).with_reporter(reporter.clone());

    let report = runner.run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed_types, vec![ResourceType::Rds]);
    assert!(report.findings(ResourceType::Rds).is_none());
    let flushed: Vec<_> = reporter
        .flushes
        .lock()
        .unwrap()
        .iter()
        .map(|(ty, _)| *ty)
        .collect();
    assert!(!flushed.contains(&ResourceType::Rds));
    assert_eq!(flushed.len(), 4);
}

#[tokio::test]
async fn test_ec2_listing_failure_also_fails_eip() {
    let inventory = MemoryInventory {
        failing: vec![ResourceType::Ec2],
        ..fleet()
    };
    let runner = runner(inventory, HealthRegistry::new());

    let report = runner.run_pass(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        report.failed_types,
        vec![ResourceType::Eip, ResourceType::Ec2]
    );
}

#[tokio::test]
async fn test_cancelled_pass_flushes_nothing() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let metrics = FnMetrics(Box::new(move |_: &MetricQuery<'_>| {
        trigger.cancel();
        Ok(Some(0.0))
    }));
    let reporter = Arc::new(RecordingReporter::default());
    let health = HealthRegistry::new();
    let runner = PassRunner::new(
        Arc::new(fleet()),
        Arc::new(metrics),
        RuleBook::new(Thresholds::default()),
        PassSettings::default(),
        StructuredLogger::new("eu-west-1"),
    )
    .with_reporter(reporter.clone())
    .with_health(health.clone());

    let result = runner.run_pass(&cancel).await;

    assert!(matches!(result, Err(PassError::Cancelled)));
    assert!(reporter.flushes.lock().unwrap().is_empty());
    assert_eq!(*reporter.finished.lock().unwrap(), 0);
    assert!(health.last_pass().await.is_none());
}

#[tokio::test]
async fn test_export_failure_does_not_block_other_reporters() {
    let health = HealthRegistry::new();
    let reporter = Arc::new(RecordingReporter::default());
    let runner = runner(fleet(), health.clone())
        .with_reporter(Arc::new(BrokenReporter))
        .with_reporter(reporter.clone());

    let report = runner.run_pass(&CancellationToken::new()).await;

    assert!(report.is_ok());
    assert_eq!(reporter.flushes.lock().unwrap().len(), 5);
    let status = health.health().await;
    assert_eq!(
        status.components[components::REPORTER].status,
        ComponentStatus::Degraded
    );
}
