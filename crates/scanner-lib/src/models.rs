//! Core data models for the orphan scanner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known keys in [`ResourceDescriptor::attributes`]
pub mod attrs {
    pub const STATE: &str = "state";
    pub const TAGS: &str = "tags";
    pub const ARN: &str = "arn";
    pub const CREATED_AT: &str = "created_at";
    pub const ATTACHMENTS: &str = "attachments";
    pub const PUBLIC_IP: &str = "public_ip";
}

/// Kinds of cloud resources the scanner knows how to classify
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "EC2")]
    Ec2,
    #[serde(rename = "EBS_VOLUME")]
    EbsVolume,
    #[serde(rename = "ELB")]
    Elb,
    #[serde(rename = "EIP")]
    Eip,
    #[serde(rename = "RDS")]
    Rds,
}

impl ResourceType {
    /// Order in which a pass visits resource types
    pub const SCAN_ORDER: [ResourceType; 5] = [
        ResourceType::Eip,
        ResourceType::Ec2,
        ResourceType::EbsVolume,
        ResourceType::Elb,
        ResourceType::Rds,
    ];

    /// Short label used in logs and record exports
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Ec2 => "EC2",
            ResourceType::EbsVolume => "VOLUME",
            ResourceType::Elb => "ELB",
            ResourceType::Eip => "EIP",
            ResourceType::Rds => "RDS",
        }
    }

    /// Monitoring namespace the type's metrics live under
    pub fn namespace(&self) -> &'static str {
        match self {
            ResourceType::Ec2 | ResourceType::Eip => "AWS/EC2",
            ResourceType::EbsVolume => "AWS/EBS",
            ResourceType::Elb => "AWS/ApplicationELB",
            ResourceType::Rds => "AWS/RDS",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Attachment of a volume to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub instance_id: String,
    pub state: String,
    #[serde(default)]
    pub attach_time: Option<DateTime<Utc>>,
}

/// A static attribute value of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Tags(Vec<Tag>),
    Attachments(Vec<Attachment>),
}

/// Static attributes keyed by attribute name
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Most recent attachment time across the attachments recorded in `attributes`
pub fn latest_attach_time(attributes: &Attributes) -> Option<DateTime<Utc>> {
    match attributes.get(attrs::ATTACHMENTS) {
        Some(AttributeValue::Attachments(list)) => {
            list.iter().filter_map(|a| a.attach_time).max()
        }
        _ => None,
    }
}

/// Immutable snapshot of one resource taken once per pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceDescriptor {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: &str, value: AttributeValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_text(self, key: &str, value: impl Into<String>) -> Self {
        self.with_attr(key, AttributeValue::Text(value.into()))
    }

    /// Text attribute, if present and textual
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(AttributeValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.attributes.get(key) {
            Some(AttributeValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    /// Resource tags; empty when the resource carries none
    pub fn tags(&self) -> &[Tag] {
        match self.attributes.get(attrs::TAGS) {
            Some(AttributeValue::Tags(tags)) => tags,
            _ => &[],
        }
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags().iter().any(|t| t.key == key)
    }

    /// Volume attachments; empty when unattached
    pub fn attachments(&self) -> &[Attachment] {
        match self.attributes.get(attrs::ATTACHMENTS) {
            Some(AttributeValue::Attachments(a)) => a,
            _ => &[],
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.text(attrs::STATE)
    }
}

/// Statistic requested from the metric source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Average,
    Sum,
}

/// One statistical observation over the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub statistic: Statistic,
    pub value: f64,
    /// False when the source returned no datapoints
    pub present: bool,
}

impl MetricSample {
    pub fn present(metric_name: impl Into<String>, statistic: Statistic, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            statistic,
            value,
            present: true,
        }
    }

    pub fn absent(metric_name: impl Into<String>, statistic: Statistic) -> Self {
        Self {
            metric_name: metric_name.into(),
            statistic,
            value: 0.0,
            present: false,
        }
    }
}

/// Samples for one resource and one lookback window, keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    samples: BTreeMap<String, MetricSample>,
}

impl MetricBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample: MetricSample) {
        self.samples.insert(sample.metric_name.clone(), sample);
    }

    pub fn with(mut self, sample: MetricSample) -> Self {
        self.insert(sample);
        self
    }

    pub fn get(&self, metric_name: &str) -> Option<&MetricSample> {
        self.samples.get(metric_name)
    }

    /// Value of a present sample; `None` for absent or missing metrics
    pub fn value(&self, metric_name: &str) -> Option<f64> {
        self.get(metric_name).filter(|s| s.present).map(|s| s.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.values()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Classification outcome for a flagged resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Orphaned,
    PotentiallyOrphaned,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Orphaned => write!(f, "orphaned"),
            Verdict::PotentiallyOrphaned => write!(f, "potentially_orphaned"),
        }
    }
}

/// A flagged resource, unique per (resource_type, resource_id) within a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub verdict: Verdict,
    pub reason_code: String,
    pub metrics: MetricBundle,
    pub attributes: Attributes,
}

impl Finding {
    pub fn is_orphaned(&self) -> bool {
        self.verdict == Verdict::Orphaned
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(AttributeValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
