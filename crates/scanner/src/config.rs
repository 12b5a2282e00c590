//! Scanner configuration
//!
//! Loaded once at startup from a YAML file, overlaid by `SCANNER_*`
//! environment variables. Any missing or invalid value is fatal.

use anyhow::{Context, Result};
use scanner_lib::{AbsentPolicy, ConfigError, PassSettings, RuleBook, Thresholds};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "SCANNER_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config.yml";
const ENV_PREFIX: &str = "SCANNER";

/// Process settings
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Region whose resources are scanned
    pub region_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Sleep between the end of one pass and the start of the next
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Metric statistics window
    #[serde(default = "default_lookback")]
    pub lookback_secs: u64,

    /// Timeout of a single metric request
    #[serde(default = "default_metric_timeout")]
    pub metric_timeout_secs: u64,

    #[serde(default)]
    pub absent_metrics: AbsentPolicy,

    /// JSON inventory snapshot read at each pass
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,

    /// Directory receiving the CSV exports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Tags every database instance must carry
    #[serde(default = "default_required_tags")]
    pub required_tags: Vec<String>,
}

fn default_api_port() -> u16 {
    8090
}

fn default_scan_interval() -> u64 {
    86_400
}

fn default_lookback() -> u64 {
    86_400
}

fn default_metric_timeout() -> u64 {
    30
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("inventory.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_required_tags() -> Vec<String> {
    vec!["Project".to_string(), "Environment".to_string()]
}

/// Process settings plus rule thresholds
#[derive(Debug, Clone)]
pub struct Settings {
    pub scanner: ScannerConfig,
    pub thresholds: Thresholds,
}

impl Settings {
    /// Load from `SCANNER_CONFIG` (default `config.yml`) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(path)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("required_tags"),
            )
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        let scanner: ScannerConfig = config
            .clone()
            .try_deserialize()
            .context("invalid scanner settings")?;
        let thresholds: Thresholds = config
            .try_deserialize()
            .context("invalid or missing thresholds")?;

        let settings = Self {
            scanner,
            thresholds,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.region_name.trim().is_empty() {
            return Err(ConfigError::Empty("region_name"));
        }
        if self.scanner.scan_interval_secs == 0 {
            return Err(ConfigError::Zero("scan_interval_secs"));
        }
        if self.scanner.lookback_secs == 0 {
            return Err(ConfigError::Zero("lookback_secs"));
        }
        if self.scanner.metric_timeout_secs == 0 {
            return Err(ConfigError::Zero("metric_timeout_secs"));
        }
        self.thresholds.validate()
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scanner.scan_interval_secs)
    }

    pub fn pass_settings(&self) -> PassSettings {
        PassSettings {
            lookback: Duration::from_secs(self.scanner.lookback_secs),
            metric_timeout: Duration::from_secs(self.scanner.metric_timeout_secs),
        }
    }

    pub fn rule_book(&self) -> RuleBook {
        RuleBook::new(self.thresholds.clone())
            .with_absent_policy(self.scanner.absent_metrics)
            .with_required_tags(self.scanner.required_tags.clone())
    }
}
