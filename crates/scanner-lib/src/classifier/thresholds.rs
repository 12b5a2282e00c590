//! Comparison operands consumed by the rule chains

use serde::Deserialize;
use thiserror::Error;

/// Invalid or incomplete scanner configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold `{key}` must be a finite number, got {value}")]
    NonFinite { key: &'static str, value: f64 },

    #[error("threshold `{key}` must not be negative, got {value}")]
    Negative { key: &'static str, value: f64 },

    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

/// Per-metric thresholds for every resource type
///
/// Field names on the wire are the configuration keys operators already use,
/// including the historical `freeStorage_threhsold` spelling. Lowercase
/// aliases accept the same keys after case folding by the config loader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Thresholds {
    // EC2
    #[serde(rename = "diskReadOps", alias = "diskreadops")]
    pub disk_read_ops: f64,
    #[serde(rename = "diskWriteOps", alias = "diskwriteops")]
    pub disk_write_ops: f64,
    #[serde(rename = "cpu_utilisation_threshold")]
    pub cpu_utilisation: f64,
    #[serde(rename = "diskReadBytes", alias = "diskreadbytes")]
    pub disk_read_bytes: f64,
    #[serde(rename = "diskWriteBytes", alias = "diskwritebytes")]
    pub disk_write_bytes: f64,
    #[serde(rename = "min_statusCheckFailed", alias = "min_statuscheckfailed")]
    pub min_status_check_failed: f64,

    // ELB
    #[serde(rename = "healthyHostCount_threshold", alias = "healthyhostcount_threshold")]
    pub healthy_host_count: f64,
    #[serde(rename = "requestCount_threshold", alias = "requestcount_threshold")]
    pub request_count: f64,

    // EBS volumes
    #[serde(rename = "threshold1")]
    pub volume_idle_time: f64,
    #[serde(rename = "threshold2")]
    pub volume_burst_balance: f64,

    // RDS
    #[serde(rename = "threshold_days")]
    pub max_age_days: f64,
    #[serde(rename = "dbconnections_threshold")]
    pub db_connections: f64,
    #[serde(rename = "readLatency_threshold", alias = "readlatency_threshold")]
    pub read_latency: f64,
    #[serde(rename = "writeLatency_threshold", alias = "writelatency_threshold")]
    pub write_latency: f64,
    #[serde(rename = "freeableMem_threshold", alias = "freeablemem_threshold")]
    pub freeable_memory: f64,
    #[serde(rename = "freeStorage_threhsold", alias = "freestorage_threhsold")]
    pub free_storage: f64,
    #[serde(rename = "cpuSurplus_threshold", alias = "cpusurplus_threshold")]
    pub cpu_surplus: f64,
    #[serde(rename = "burstBalance_threshold", alias = "burstbalance_threshold")]
    pub burst_balance: f64,
    #[serde(rename = "ebsIOBalance_threshold", alias = "ebsiobalance_threshold")]
    pub ebs_io_balance: f64,
    #[serde(rename = "ebsByteBalance_threshold", alias = "ebsbytebalance_threshold")]
    pub ebs_byte_balance: f64,
}

impl Thresholds {
    fn entries(&self) -> [(&'static str, f64); 20] {
        [
            ("diskReadOps", self.disk_read_ops),
            ("diskWriteOps", self.disk_write_ops),
            ("cpu_utilisation_threshold", self.cpu_utilisation),
            ("diskReadBytes", self.disk_read_bytes),
            ("diskWriteBytes", self.disk_write_bytes),
            ("min_statusCheckFailed", self.min_status_check_failed),
            ("healthyHostCount_threshold", self.healthy_host_count),
            ("requestCount_threshold", self.request_count),
            ("threshold1", self.volume_idle_time),
            ("threshold2", self.volume_burst_balance),
            ("threshold_days", self.max_age_days),
            ("dbconnections_threshold", self.db_connections),
            ("readLatency_threshold", self.read_latency),
            ("writeLatency_threshold", self.write_latency),
            ("freeableMem_threshold", self.freeable_memory),
            ("freeStorage_threhsold", self.free_storage),
            ("cpuSurplus_threshold", self.cpu_surplus),
            ("burstBalance_threshold", self.burst_balance),
            ("ebsIOBalance_threshold", self.ebs_io_balance),
            ("ebsByteBalance_threshold", self.ebs_byte_balance),
        ]
    }

    /// Reject values no rule can meaningfully compare against
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in self.entries() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { key, value });
            }
        }
        if self.max_age_days < 0.0 {
            return Err(ConfigError::Negative {
                key: "threshold_days",
                value: self.max_age_days,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl Default for Thresholds {
    /// Values from the sample configuration shipped with the scanner
    fn default() -> Self {
        Self {
            disk_read_ops: 0.0,
            disk_write_ops: 0.0,
            cpu_utilisation: 20.0,
            disk_read_bytes: 0.0,
            disk_write_bytes: 0.0,
            min_status_check_failed: 1.0,
            healthy_host_count: 0.0,
            request_count: 500.0,
            volume_idle_time: 60.0,
            volume_burst_balance: 20.0,
            max_age_days: 30.0,
            db_connections: 0.0,
            read_latency: 0.0001,
            write_latency: 0.0001,
            freeable_memory: 1_073_741_824.0,
            free_storage: 1_073_741_824.0,
            cpu_surplus: 0.0,
            burst_balance: 20.0,
            ebs_io_balance: 50.0,
            ebs_byte_balance: 50.0,
        }
    }
}
