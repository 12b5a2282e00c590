//! Pass scheduling
//!
//! Runs one pass, sleeps the configured interval, and repeats until the
//! cancellation token fires. A pass is always awaited before the next sleep,
//! so at most one pass is in flight.

use crate::health::{components, HealthRegistry};
use crate::scan::{PassError, PassRunner};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of wall-clock time and delays
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Real time, backed by tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives the pass loop
pub struct Scheduler {
    runner: Arc<PassRunner>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    health: HealthRegistry,
}

impl Scheduler {
    pub fn new(runner: Arc<PassRunner>, interval: Duration) -> Self {
        Self {
            runner,
            interval,
            clock: Arc::new(SystemClock),
            health: HealthRegistry::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Run passes until `cancel` fires; returns the number of completed passes
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting detection scheduler"
        );
        self.health.set_healthy(components::SCHEDULER).await;

        let logger = self.runner.logger();
        let mut pass = 0u64;
        let mut completed = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            pass += 1;
            logger.log_pass_started(pass);
            let start = Instant::now();

            match self.runner.run_pass(&cancel).await {
                Ok(report) => {
                    completed += 1;
                    logger.log_pass_completed(
                        pass,
                        report.total_scanned(),
                        report.total_findings(),
                        report.total_skipped(),
                        start.elapsed().as_millis(),
                    );
                }
                Err(PassError::Cancelled) => {
                    info!(pass = pass, "Detection pass cancelled, results discarded");
                    break;
                }
            }

            debug!(
                sleep_secs = self.interval.as_secs(),
                "Sleeping until next pass"
            );
            tokio::select! {
                _ = self.clock.sleep(self.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        self.health
            .set_unhealthy(components::SCHEDULER, "scheduler stopped")
            .await;
        info!(passes = completed, "Detection scheduler stopped");
        completed
    }
}
