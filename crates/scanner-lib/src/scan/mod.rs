//! One detection pass over every resource type
//!
//! Types are processed in a fixed order and resources one at a time. A
//! resource whose metrics cannot be fetched is skipped, a type whose
//! inventory cannot be listed is left out of the pass, and nothing is
//! exported until every type has been classified.

#[cfg(test)]
mod tests;

use crate::aggregator::{FindingAggregator, FindingSet};
use crate::classifier::{classify, detect_eips, metric_specs, RuleBook};
use crate::health::{components, HealthRegistry, PassSummary};
use crate::models::{Finding, ResourceDescriptor, ResourceType};
use crate::observability::{ScannerMetrics, StructuredLogger};
use crate::report::Reporter;
use crate::scheduler::{Clock, SystemClock};
use crate::source::{fetch_bundle, BundleFetch, MetricSource, ResourceInventory};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why a pass produced no report
#[derive(Debug, Error)]
pub enum PassError {
    #[error("detection pass cancelled")]
    Cancelled,
}

/// Metric window and per-call timeout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSettings {
    pub lookback: Duration,
    pub metric_timeout: Duration,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(86_400),
            metric_timeout: Duration::from_secs(30),
        }
    }
}

/// Classification result of one resource type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOutcome {
    pub resource_type: ResourceType,
    /// Resources classified
    pub scanned: usize,
    /// Resources skipped after a fetch failure
    pub skipped: usize,
    pub findings: FindingSet,
}

/// Result of a completed pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Classified types in scan order
    pub outcomes: Vec<TypeOutcome>,
    /// Types whose inventory could not be listed
    pub failed_types: Vec<ResourceType>,
}

impl PassReport {
    pub fn findings(&self, resource_type: ResourceType) -> Option<&FindingSet> {
        self.outcomes
            .iter()
            .find(|o| o.resource_type == resource_type)
            .map(|o| &o.findings)
    }

    pub fn total_findings(&self) -> usize {
        self.outcomes.iter().map(|o| o.findings.len()).sum()
    }

    pub fn total_scanned(&self) -> usize {
        self.outcomes.iter().map(|o| o.scanned).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.outcomes.iter().map(|o| o.skipped).sum()
    }

    pub fn summary(&self, duration: Duration) -> PassSummary {
        PassSummary {
            finished_at: self.finished_at,
            duration_ms: duration.as_millis() as u64,
            resources_scanned: self.total_scanned(),
            resources_skipped: self.total_skipped(),
            findings: self.total_findings(),
            failed_types: self.failed_types.clone(),
        }
    }
}

/// Collaborator failures seen during one pass
#[derive(Debug, Default)]
struct FailureTally {
    inventory: usize,
    metrics: usize,
}

/// Runs detection passes against the configured collaborators
pub struct PassRunner {
    inventory: Arc<dyn ResourceInventory>,
    metric_source: Arc<dyn MetricSource>,
    reporters: Vec<Arc<dyn Reporter>>,
    rules: RuleBook,
    settings: PassSettings,
    clock: Arc<dyn Clock>,
    metrics: ScannerMetrics,
    logger: StructuredLogger,
    health: HealthRegistry,
}

impl PassRunner {
    pub fn new(
        inventory: Arc<dyn ResourceInventory>,
        metric_source: Arc<dyn MetricSource>,
        rules: RuleBook,
        settings: PassSettings,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            inventory,
            metric_source,
            reporters: Vec::new(),
            rules,
            settings,
            clock: Arc::new(SystemClock),
            metrics: ScannerMetrics::new(),
            logger,
            health: HealthRegistry::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Run one full pass: classify every type, then export the results
    ///
    /// A cancelled pass exports nothing.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassReport, PassError> {
        let timer = Instant::now();
        let started_at = self.clock.now();
        let mut tally = FailureTally::default();
        let mut outcomes = Vec::with_capacity(ResourceType::SCAN_ORDER.len());
        let mut failed_types = Vec::new();

        for resource_type in ResourceType::SCAN_ORDER {
            if cancel.is_cancelled() {
                return Err(PassError::Cancelled);
            }

            let outcome = match resource_type {
                ResourceType::Eip => self.scan_eips(&mut tally).await,
                _ => {
                    self.scan_type(resource_type, started_at, cancel, &mut tally)
                        .await?
                }
            };

            match outcome {
                Some(outcome) => {
                    self.metrics
                        .set_resources_scanned(resource_type, outcome.scanned as i64);
                    outcomes.push(outcome);
                }
                None => failed_types.push(resource_type),
            }
        }

        if cancel.is_cancelled() {
            return Err(PassError::Cancelled);
        }

        let report = PassReport {
            started_at,
            finished_at: self.clock.now(),
            outcomes,
            failed_types,
        };

        self.export(&report).await;
        self.update_source_health(&tally).await;

        let elapsed = timer.elapsed();
        self.metrics.observe_pass_duration(elapsed.as_secs_f64());
        self.metrics.inc_passes();
        self.health.record_pass(report.summary(elapsed)).await;

        Ok(report)
    }

    /// EIPs are the allocated addresses no instance reports as its public IP
    async fn scan_eips(&self, tally: &mut FailureTally) -> Option<TypeOutcome> {
        let addresses = self.list(ResourceType::Eip, tally).await?;
        let instances = self.list(ResourceType::Ec2, tally).await?;

        let mut aggregator = FindingAggregator::new();
        for finding in detect_eips(&addresses, &instances) {
            self.record(&mut aggregator, finding);
        }

        Some(TypeOutcome {
            resource_type: ResourceType::Eip,
            scanned: addresses.len(),
            skipped: 0,
            findings: aggregator.drain(),
        })
    }

    async fn scan_type(
        &self,
        resource_type: ResourceType,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        tally: &mut FailureTally,
    ) -> Result<Option<TypeOutcome>, PassError> {
        let Some(resources) = self.list(resource_type, tally).await else {
            return Ok(None);
        };
        let Some(chain) = self.rules.chain(resource_type, now) else {
            return Ok(None);
        };
        let specs = metric_specs(resource_type);

        let mut aggregator = FindingAggregator::new();
        let mut skipped = 0;

        for resource in &resources {
            if cancel.is_cancelled() {
                return Err(PassError::Cancelled);
            }

            let fetched = fetch_bundle(
                self.metric_source.as_ref(),
                resource,
                specs,
                self.settings.lookback,
                self.settings.metric_timeout,
                cancel,
            )
            .await;

            let bundle = match fetched {
                Ok(BundleFetch::Complete(bundle)) => bundle,
                Ok(BundleFetch::Cancelled) => return Err(PassError::Cancelled),
                Err(e) => {
                    self.logger
                        .log_fetch_failed(resource_type, Some(&resource.id), &e.to_string());
                    self.metrics.inc_fetch_errors();
                    tally.metrics += 1;
                    skipped += 1;
                    continue;
                }
            };

            if let Some(finding) = classify(resource, &bundle, &chain) {
                self.record(&mut aggregator, finding);
            }
        }

        debug!(
            resource_type = %resource_type,
            resources = resources.len(),
            flagged = aggregator.len(),
            skipped = skipped,
            "Classified resource type"
        );

        Ok(Some(TypeOutcome {
            resource_type,
            scanned: resources.len() - skipped,
            skipped,
            findings: aggregator.drain(),
        }))
    }

    async fn list(
        &self,
        resource_type: ResourceType,
        tally: &mut FailureTally,
    ) -> Option<Vec<ResourceDescriptor>> {
        match self.inventory.list(resource_type).await {
            Ok(resources) => Some(resources),
            Err(e) => {
                self.logger
                    .log_fetch_failed(resource_type, None, &e.to_string());
                self.metrics.inc_fetch_errors();
                tally.inventory += 1;
                None
            }
        }
    }

    fn record(&self, aggregator: &mut FindingAggregator, finding: Finding) {
        self.logger.log_flagged(
            finding.resource_type,
            &finding.resource_id,
            finding.verdict,
            &finding.reason_code,
        );
        aggregator.record(finding);
    }

    /// Flush each classified type to every reporter once, then finish the pass
    async fn export(&self, report: &PassReport) {
        let mut failures = 0usize;

        for reporter in &self.reporters {
            for outcome in &report.outcomes {
                if let Err(e) =
                    reporter.flush(outcome.resource_type, &outcome.findings, report.started_at)
                {
                    self.logger.log_export_failed(
                        reporter.name(),
                        Some(outcome.resource_type),
                        &e.to_string(),
                    );
                    self.metrics.inc_export_errors();
                    failures += 1;
                }
            }

            if let Err(e) = reporter.finish_pass(report) {
                self.logger
                    .log_export_failed(reporter.name(), None, &e.to_string());
                self.metrics.inc_export_errors();
                failures += 1;
            }
        }

        if failures > 0 {
            self.health
                .set_degraded(
                    components::REPORTER,
                    format!("{failures} export(s) failed in last pass"),
                )
                .await;
        } else {
            self.health.set_healthy(components::REPORTER).await;
        }
    }

    async fn update_source_health(&self, tally: &FailureTally) {
        if tally.inventory > 0 {
            self.health
                .set_degraded(
                    components::INVENTORY,
                    format!("{} listing(s) failed in last pass", tally.inventory),
                )
                .await;
        } else {
            self.health.set_healthy(components::INVENTORY).await;
        }

        if tally.metrics > 0 {
            self.health
                .set_degraded(
                    components::METRIC_SOURCE,
                    format!("{} resource(s) skipped in last pass", tally.metrics),
                )
                .await;
        } else {
            self.health.set_healthy(components::METRIC_SOURCE).await;
        }
    }
}
