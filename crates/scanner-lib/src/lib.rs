//! Scanner library for orphaned cloud resource detection
//!
//! This crate provides the core functionality for:
//! - Rule-based classification of EC2, EBS, ELB and RDS resources
//! - Elastic IP detection by set difference
//! - Pass orchestration and scheduling over inventory and metric sources
//! - Prometheus and CSV export of findings
//! - Health checks and observability

pub mod aggregator;
pub mod classifier;
pub mod health;
pub mod models;
pub mod observability;
pub mod report;
pub mod scan;
pub mod scheduler;
pub mod source;

pub use aggregator::{FindingAggregator, FindingSet};
pub use classifier::{classify, AbsentPolicy, ConfigError, RuleBook, RuleChain, Thresholds};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, PassSummary,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{ScannerMetrics, StructuredLogger};
pub use report::{CsvReporter, GaugeReporter, Reporter};
pub use scan::{PassError, PassReport, PassRunner, PassSettings};
pub use scheduler::{Clock, Scheduler, SystemClock};
pub use source::{MetricSource, ResourceInventory, SnapshotSource};
