//! Per-pass finding aggregation
//!
//! Findings are keyed strictly on (resource type, resource id). Recording the
//! same resource twice in a pass keeps only the most recent finding, even
//! when the metric snapshots differ.

use crate::models::{Finding, ResourceType, Verdict};
use std::collections::BTreeMap;

/// Identity of a finding within a pass
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FindingKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl From<&Finding> for FindingKey {
    fn from(finding: &Finding) -> Self {
        Self {
            resource_type: finding.resource_type,
            resource_id: finding.resource_id.clone(),
        }
    }
}

/// De-duplicated findings of one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindingSet {
    findings: BTreeMap<FindingKey, Finding>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finding, returning the one it replaced
    pub fn insert(&mut self, finding: Finding) -> Option<Finding> {
        self.findings.insert(FindingKey::from(&finding), finding)
    }

    pub fn get(&self, resource_type: ResourceType, resource_id: &str) -> Option<&Finding> {
        self.findings.get(&FindingKey {
            resource_type,
            resource_id: resource_id.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.values()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn orphaned_count(&self) -> usize {
        self.iter().filter(|f| f.verdict == Verdict::Orphaned).count()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings.into_values().collect()
    }
}

impl Extend<Finding> for FindingSet {
    fn extend<I: IntoIterator<Item = Finding>>(&mut self, iter: I) {
        for finding in iter {
            self.insert(finding);
        }
    }
}

impl FromIterator<Finding> for FindingSet {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut set = FindingSet::new();
        set.extend(iter);
        set
    }
}

/// Collects classifier verdicts until the pass drains them
#[derive(Debug, Default)]
pub struct FindingAggregator {
    current: FindingSet,
}

impl FindingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, finding: Finding) {
        if let Some(previous) = self.current.insert(finding) {
            tracing::debug!(
                resource_type = %previous.resource_type,
                resource_id = %previous.resource_id,
                "Replaced earlier finding for resource"
            );
        }
    }

    /// Take the accumulated findings, leaving the aggregator empty
    pub fn drain(&mut self) -> FindingSet {
        std::mem::take(&mut self.current)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}
