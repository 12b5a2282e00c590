//! Per-type rule chains and the metrics each type needs

use super::{AbsentPolicy, Operator, Predicate, RuleChain, Thresholds};
use crate::models::{attrs, ResourceType, Statistic};
use chrono::{DateTime, Utc};

/// Metric names as published by the monitoring service
pub mod metric_names {
    pub const DISK_READ_OPS: &str = "DiskReadOps";
    pub const DISK_WRITE_OPS: &str = "DiskWriteOps";
    pub const CPU_UTILIZATION: &str = "CPUUtilization";
    pub const DISK_READ_BYTES: &str = "DiskReadBytes";
    pub const DISK_WRITE_BYTES: &str = "DiskWriteBytes";
    pub const STATUS_CHECK_FAILED: &str = "StatusCheckFailed_Instance";

    pub const VOLUME_READ_OPS: &str = "VolumeReadOps";
    pub const VOLUME_WRITE_OPS: &str = "VolumeWriteOps";
    pub const VOLUME_IDLE_TIME: &str = "VolumeIdleTime";
    pub const BURST_BALANCE: &str = "BurstBalance";

    pub const HEALTHY_HOST_COUNT: &str = "HealthyHostCount";
    pub const REQUEST_COUNT: &str = "RequestCount";

    pub const DATABASE_CONNECTIONS: &str = "DatabaseConnections";
    pub const READ_LATENCY: &str = "ReadLatency";
    pub const WRITE_LATENCY: &str = "WriteLatency";
    pub const FREEABLE_MEMORY: &str = "FreeableMemory";
    pub const FREE_STORAGE_SPACE: &str = "FreeStorageSpace";
    pub const CPU_SURPLUS_CREDIT_BALANCE: &str = "CPUSurplusCreditBalance";
    pub const EBS_IO_BALANCE: &str = "EBSIOBalance%";
    pub const EBS_BYTE_BALANCE: &str = "EBSByteBalance%";
}

/// Reason codes attached to findings
pub mod reasons {
    pub const STATE_FAILED: &str = "state-failed";
    pub const DISK_READ_OPS_FLOOR: &str = "diskReadOps-floor";
    pub const DISK_WRITE_OPS_FLOOR: &str = "diskWriteOps-floor";
    pub const CPU_UTILISATION_LOW: &str = "cpu-utilisation-low";
    pub const DISK_READ_BYTES_FLOOR: &str = "diskReadBytes-floor";
    pub const DISK_WRITE_BYTES_FLOOR: &str = "diskWriteBytes-floor";
    pub const STATUS_CHECK_FAILED: &str = "status-check-failed";

    pub const UNATTACHED: &str = "unattached";
    pub const UNTAGGED: &str = "untagged";
    pub const UNNAMED: &str = "unnamed";
    pub const IDLE_OR_BURST_DEPLETED: &str = "idle-or-burst-depleted";
    pub const ATTACHMENT_STOPPED: &str = "attachment-stopped";

    pub const NO_HEALTHY_HOSTS: &str = "no-healthy-hosts";
    pub const LOW_REQUEST_COUNT: &str = "low-request-count";

    pub const STATUS_UNEXPECTED: &str = "status-unexpected";
    pub const IDENTIFIER_MISSING: &str = "identifier-missing";
    pub const ARN_MISSING: &str = "arn-missing";
    pub const AGE_EXCEEDED: &str = "age-exceeded";
    pub const REQUIRED_TAGS_MISSING: &str = "required-tags-missing";
    pub const NO_CONNECTIONS: &str = "no-connections";
    pub const READ_LATENCY_LOW: &str = "read-latency-low";
    pub const WRITE_LATENCY_LOW: &str = "write-latency-low";
    pub const FREEABLE_MEMORY_LOW: &str = "freeable-memory-low";
    pub const FREE_STORAGE_LOW: &str = "free-storage-low";
    pub const CPU_SURPLUS_FLOOR: &str = "cpu-surplus-floor";
    pub const BURST_BALANCE_LOW: &str = "burst-balance-low";
    pub const EBS_IO_BALANCE_LOW: &str = "ebs-io-balance-low";
    pub const EBS_BYTE_BALANCE_LOW: &str = "ebs-byte-balance-low";
}

/// A metric the scanner requests for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub statistic: Statistic,
}

const fn avg(name: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        statistic: Statistic::Average,
    }
}

const fn sum(name: &'static str) -> MetricSpec {
    MetricSpec {
        name,
        statistic: Statistic::Sum,
    }
}

use metric_names::*;

const EC2_METRICS: &[MetricSpec] = &[
    avg(DISK_READ_OPS),
    avg(DISK_WRITE_OPS),
    avg(CPU_UTILIZATION),
    avg(DISK_READ_BYTES),
    avg(DISK_WRITE_BYTES),
    sum(STATUS_CHECK_FAILED),
];

const VOLUME_METRICS: &[MetricSpec] = &[
    sum(VOLUME_READ_OPS),
    sum(VOLUME_WRITE_OPS),
    avg(VOLUME_IDLE_TIME),
    avg(BURST_BALANCE),
];

const ELB_METRICS: &[MetricSpec] = &[avg(HEALTHY_HOST_COUNT), sum(REQUEST_COUNT)];

const RDS_METRICS: &[MetricSpec] = &[
    sum(DATABASE_CONNECTIONS),
    avg(READ_LATENCY),
    avg(WRITE_LATENCY),
    avg(BURST_BALANCE),
    avg(FREEABLE_MEMORY),
    avg(FREE_STORAGE_SPACE),
    avg(CPU_SURPLUS_CREDIT_BALANCE),
    avg(EBS_IO_BALANCE),
    avg(EBS_BYTE_BALANCE),
];

/// Metrics fetched per resource of the given type (none for EIP)
pub fn metric_specs(resource_type: ResourceType) -> &'static [MetricSpec] {
    match resource_type {
        ResourceType::Ec2 => EC2_METRICS,
        ResourceType::EbsVolume => VOLUME_METRICS,
        ResourceType::Elb => ELB_METRICS,
        ResourceType::Rds => RDS_METRICS,
        ResourceType::Eip => &[],
    }
}

/// Builds the per-type rule chains from configuration
#[derive(Debug, Clone)]
pub struct RuleBook {
    thresholds: Thresholds,
    absent_policy: AbsentPolicy,
    required_tags: Vec<String>,
}

impl RuleBook {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            absent_policy: AbsentPolicy::default(),
            required_tags: vec!["Project".to_string(), "Environment".to_string()],
        }
    }

    pub fn with_absent_policy(mut self, policy: AbsentPolicy) -> Self {
        self.absent_policy = policy;
        self
    }

    pub fn with_required_tags(mut self, tags: Vec<String>) -> Self {
        self.required_tags = tags;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Chain for a metric-driven type, evaluated as of `now`
    ///
    /// EIP has no chain; it is detected by set difference.
    pub fn chain(&self, resource_type: ResourceType, now: DateTime<Utc>) -> Option<RuleChain> {
        let chain = match resource_type {
            ResourceType::Ec2 => self.ec2_chain(),
            ResourceType::EbsVolume => self.volume_chain(),
            ResourceType::Elb => self.elb_chain(),
            ResourceType::Rds => self.rds_chain(now),
            ResourceType::Eip => return None,
        };
        Some(chain.absent_policy(self.absent_policy))
    }

    pub fn ec2_chain(&self) -> RuleChain {
        let t = &self.thresholds;
        RuleChain::new(ResourceType::Ec2)
            .orphaned_when(reasons::STATE_FAILED, Predicate::StateIs("failed".into()))
            .orphaned_when(
                reasons::DISK_READ_OPS_FLOOR,
                Predicate::metric(DISK_READ_OPS, Operator::Eq, t.disk_read_ops),
            )
            .orphaned_when(
                reasons::DISK_WRITE_OPS_FLOOR,
                Predicate::metric(DISK_WRITE_OPS, Operator::Eq, t.disk_write_ops),
            )
            .orphaned_when(
                reasons::CPU_UTILISATION_LOW,
                Predicate::metric(CPU_UTILIZATION, Operator::Lt, t.cpu_utilisation),
            )
            .orphaned_when(
                reasons::DISK_READ_BYTES_FLOOR,
                Predicate::metric(DISK_READ_BYTES, Operator::Eq, t.disk_read_bytes),
            )
            .orphaned_when(
                reasons::DISK_WRITE_BYTES_FLOOR,
                Predicate::metric(DISK_WRITE_BYTES, Operator::Eq, t.disk_write_bytes),
            )
            .orphaned_when(
                reasons::STATUS_CHECK_FAILED,
                Predicate::metric(STATUS_CHECK_FAILED, Operator::Gte, t.min_status_check_failed),
            )
    }

    /// The tag and usage rules only consider unattached volumes; a stopped
    /// attachment is checked for every volume.
    pub fn volume_chain(&self) -> RuleChain {
        let t = &self.thresholds;
        let unattached_in_use = |extra: Predicate| {
            Predicate::All(vec![
                Predicate::Unattached,
                Predicate::StateIs("in-use".into()),
                extra,
            ])
        };

        RuleChain::new(ResourceType::EbsVolume)
            .orphaned_when(
                reasons::UNATTACHED,
                Predicate::All(vec![
                    Predicate::Unattached,
                    Predicate::StateNotIn(vec!["in-use".into()]),
                ]),
            )
            .orphaned_when(reasons::UNTAGGED, unattached_in_use(Predicate::Untagged))
            .orphaned_when(
                reasons::UNNAMED,
                unattached_in_use(Predicate::MissingTag("Name".into())),
            )
            .orphaned_when(
                reasons::IDLE_OR_BURST_DEPLETED,
                Predicate::All(vec![
                    Predicate::Unattached,
                    Predicate::Any(vec![
                        Predicate::metric(VOLUME_IDLE_TIME, Operator::Lt, t.volume_idle_time),
                        Predicate::metric(BURST_BALANCE, Operator::Lte, t.volume_burst_balance),
                    ]),
                ]),
            )
            .orphaned_when(
                reasons::ATTACHMENT_STOPPED,
                Predicate::AttachmentInState("stopped".into()),
            )
    }

    pub fn elb_chain(&self) -> RuleChain {
        let t = &self.thresholds;
        RuleChain::new(ResourceType::Elb)
            .orphaned_when(
                reasons::NO_HEALTHY_HOSTS,
                Predicate::Any(vec![
                    Predicate::MetricAbsent(HEALTHY_HOST_COUNT.into()),
                    Predicate::metric(HEALTHY_HOST_COUNT, Operator::Eq, t.healthy_host_count),
                ]),
            )
            .potentially_orphaned_when(
                reasons::LOW_REQUEST_COUNT,
                Predicate::metric(REQUEST_COUNT, Operator::Lt, t.request_count),
            )
    }

    pub fn rds_chain(&self, now: DateTime<Utc>) -> RuleChain {
        let t = &self.thresholds;
        RuleChain::new(ResourceType::Rds)
            .orphaned_when(
                reasons::STATUS_UNEXPECTED,
                Predicate::StateNotIn(vec!["available".into(), "stopped".into()]),
            )
            .orphaned_when(reasons::IDENTIFIER_MISSING, Predicate::IdentifierEmpty)
            .orphaned_when(reasons::ARN_MISSING, Predicate::AttrEmpty(attrs::ARN.into()))
            .orphaned_when(
                reasons::AGE_EXCEEDED,
                Predicate::AgeExceedsDays {
                    now,
                    days: t.max_age_days,
                },
            )
            .orphaned_when(
                reasons::REQUIRED_TAGS_MISSING,
                Predicate::MissingAnyTag(self.required_tags.clone()),
            )
            .orphaned_when(
                reasons::NO_CONNECTIONS,
                Predicate::metric(DATABASE_CONNECTIONS, Operator::Eq, t.db_connections),
            )
            .orphaned_when(
                reasons::READ_LATENCY_LOW,
                Predicate::metric(READ_LATENCY, Operator::Lt, t.read_latency),
            )
            .orphaned_when(
                reasons::WRITE_LATENCY_LOW,
                Predicate::metric(WRITE_LATENCY, Operator::Lt, t.write_latency),
            )
            .orphaned_when(
                reasons::FREEABLE_MEMORY_LOW,
                Predicate::metric(FREEABLE_MEMORY, Operator::Lt, t.freeable_memory),
            )
            .orphaned_when(
                reasons::FREE_STORAGE_LOW,
                Predicate::metric(FREE_STORAGE_SPACE, Operator::Lt, t.free_storage),
            )
            .orphaned_when(
                reasons::CPU_SURPLUS_FLOOR,
                Predicate::metric(CPU_SURPLUS_CREDIT_BALANCE, Operator::Eq, t.cpu_surplus),
            )
            .orphaned_when(
                reasons::BURST_BALANCE_LOW,
                Predicate::metric(BURST_BALANCE, Operator::Lte, t.burst_balance),
            )
            .orphaned_when(
                reasons::EBS_IO_BALANCE_LOW,
                Predicate::metric(EBS_IO_BALANCE, Operator::Lte, t.ebs_io_balance),
            )
            .orphaned_when(
                reasons::EBS_BYTE_BALANCE_LOW,
                Predicate::metric(EBS_BYTE_BALANCE, Operator::Lte, t.ebs_byte_balance),
            )
    }
}
