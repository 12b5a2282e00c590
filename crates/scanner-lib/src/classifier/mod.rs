//! Orphan classification engine
//!
//! Each resource type has an ordered [`RuleChain`]. Rules are evaluated top to
//! bottom against the resource's static attributes and its [`MetricBundle`];
//! the first rule whose predicate holds decides the verdict and later rules
//! are never evaluated. Rule order encodes priority, not severity.

mod eip;
mod rules;
mod thresholds;


pub use eip::{detect_eips, orphaned_addresses, UNASSOCIATED_ADDRESS};
pub use rules::{metric_names, metric_specs, reasons, MetricSpec, RuleBook};
pub use thresholds::{ConfigError, Thresholds};

use crate::models::{Finding, MetricBundle, ResourceDescriptor, ResourceType, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value an absent sample takes under [`AbsentPolicy::Floor`]
pub const METRIC_FLOOR: f64 = 0.0;

/// How a metric with no datapoints is treated during rule evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentPolicy {
    /// Absent samples evaluate as the metric floor
    #[default]
    Floor,
    /// Comparisons against absent samples never match
    Skip,
}

/// Comparison operator of a threshold rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Lte,
    Gte,
}

impl Operator {
    pub fn compare(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Eq => (lhs - rhs).abs() < f64::EPSILON,
            Operator::Lt => lhs < rhs,
            Operator::Lte => lhs <= rhs,
            Operator::Gte => lhs >= rhs,
        }
    }
}

/// A metric compared against a configured operand
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric_name: String,
    pub operator: Operator,
    pub value: f64,
}

impl Threshold {
    pub fn new(metric_name: impl Into<String>, operator: Operator, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            operator,
            value,
        }
    }

    fn matches(&self, bundle: &MetricBundle, policy: AbsentPolicy) -> bool {
        match (bundle.value(&self.metric_name), policy) {
            (Some(observed), _) => self.operator.compare(observed, self.value),
            (None, AbsentPolicy::Floor) => self.operator.compare(METRIC_FLOOR, self.value),
            (None, AbsentPolicy::Skip) => false,
        }
    }
}

/// Condition over a resource's attributes and metrics
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Metric(Threshold),
    /// The metric returned no datapoints (independent of [`AbsentPolicy`])
    MetricAbsent(String),
    StateIs(String),
    StateNotIn(Vec<String>),
    IdentifierEmpty,
    /// Text attribute missing or empty
    AttrEmpty(String),
    Unattached,
    Untagged,
    MissingTag(String),
    MissingAnyTag(Vec<String>),
    AttachmentInState(String),
    /// Whole days since `created_at` strictly exceed `days`
    AgeExceedsDays { now: DateTime<Utc>, days: f64 },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn metric(metric_name: &str, operator: Operator, value: f64) -> Self {
        Predicate::Metric(Threshold::new(metric_name, operator, value))
    }

    pub fn evaluate(
        &self,
        resource: &ResourceDescriptor,
        bundle: &MetricBundle,
        policy: AbsentPolicy,
    ) -> bool {
        match self {
            Predicate::Metric(threshold) => threshold.matches(bundle, policy),
            Predicate::MetricAbsent(name) => bundle.value(name).is_none(),
            Predicate::StateIs(state) => resource.state() == Some(state.as_str()),
            Predicate::StateNotIn(allowed) => {
                let state = resource.state().unwrap_or_default();
                !allowed.iter().any(|s| s == state)
            }
            Predicate::IdentifierEmpty => resource.id.trim().is_empty(),
            Predicate::AttrEmpty(key) => resource
                .text(key)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true),
            Predicate::Unattached => resource.attachments().is_empty(),
            Predicate::Untagged => resource.tags().is_empty(),
            Predicate::MissingTag(key) => !resource.has_tag(key),
            Predicate::MissingAnyTag(keys) => keys.iter().any(|k| !resource.has_tag(k)),
            Predicate::AttachmentInState(state) => {
                resource.attachments().iter().any(|a| &a.state == state)
            }
            Predicate::AgeExceedsDays { now, days } => resource
                .timestamp(crate::models::attrs::CREATED_AT)
                .map(|created| (*now - created).num_days() as f64 > *days)
                .unwrap_or(false),
            Predicate::All(preds) => preds.iter().all(|p| p.evaluate(resource, bundle, policy)),
            Predicate::Any(preds) => preds.iter().any(|p| p.evaluate(resource, bundle, policy)),
        }
    }
}

/// One step of a rule chain
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub predicate: Predicate,
    pub reason_code: String,
    pub verdict: Verdict,
}

/// Ordered, short-circuiting rules for one resource type
#[derive(Debug, Clone, PartialEq)]
pub struct RuleChain {
    pub resource_type: ResourceType,
    pub absent_policy: AbsentPolicy,
    rules: Vec<Rule>,
}

impl RuleChain {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            absent_policy: AbsentPolicy::default(),
            rules: Vec::new(),
        }
    }

    pub fn absent_policy(mut self, policy: AbsentPolicy) -> Self {
        self.absent_policy = policy;
        self
    }

    /// Append a rule yielding [`Verdict::Orphaned`]
    pub fn orphaned_when(self, reason_code: &str, predicate: Predicate) -> Self {
        self.rule(reason_code, Verdict::Orphaned, predicate)
    }

    /// Append a rule yielding [`Verdict::PotentiallyOrphaned`]
    pub fn potentially_orphaned_when(self, reason_code: &str, predicate: Predicate) -> Self {
        self.rule(reason_code, Verdict::PotentiallyOrphaned, predicate)
    }

    fn rule(mut self, reason_code: &str, verdict: Verdict, predicate: Predicate) -> Self {
        self.rules.push(Rule {
            predicate,
            reason_code: reason_code.to_string(),
            verdict,
        });
        self
    }

    /// First rule whose predicate holds
    pub fn first_match(
        &self,
        resource: &ResourceDescriptor,
        bundle: &MetricBundle,
    ) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.predicate.evaluate(resource, bundle, self.absent_policy))
    }
}

/// Classify one resource against its chain
///
/// Returns `None` when no rule matches (the resource is presumed healthy) or
/// when the chain belongs to a different resource type.
pub fn classify(
    resource: &ResourceDescriptor,
    bundle: &MetricBundle,
    chain: &RuleChain,
) -> Option<Finding> {
    if resource.resource_type != chain.resource_type {
        tracing::debug!(
            resource_id = %resource.id,
            resource_type = %resource.resource_type,
            chain_type = %chain.resource_type,
            "Rule chain does not apply to resource type"
        );
        return None;
    }

    chain.first_match(resource, bundle).map(|rule| Finding {
        resource_type: resource.resource_type,
        resource_id: resource.id.clone(),
        verdict: rule.verdict,
        reason_code: rule.reason_code.clone(),
        metrics: bundle.clone(),
        attributes: resource.attributes.clone(),
    })
}
