//! Elastic IP detection
//!
//! An allocated address is orphaned when no instance reports it as its public
//! IP. There are no metrics or thresholds involved.

use crate::models::{attrs, Finding, MetricBundle, ResourceDescriptor, Verdict};
use std::collections::BTreeSet;

pub const UNASSOCIATED_ADDRESS: &str = "unassociated-address";

/// Allocated addresses minus associated addresses
pub fn orphaned_addresses<'a>(
    allocated: impl IntoIterator<Item = &'a str>,
    associated: &BTreeSet<String>,
) -> BTreeSet<String> {
    allocated
        .into_iter()
        .filter(|ip| !associated.contains(*ip))
        .map(str::to_string)
        .collect()
}

/// Findings for every allocated EIP not bound to an instance
///
/// `addresses` are EIP descriptors whose id is the public IP; `instances` are
/// EC2 descriptors carrying a `public_ip` attribute.
pub fn detect_eips(
    addresses: &[ResourceDescriptor],
    instances: &[ResourceDescriptor],
) -> Vec<Finding> {
    let associated: BTreeSet<String> = instances
        .iter()
        .filter_map(|i| i.text(attrs::PUBLIC_IP))
        .map(str::to_string)
        .collect();

    let orphaned = orphaned_addresses(addresses.iter().map(|a| a.id.as_str()), &associated);

    addresses
        .iter()
        .filter(|a| orphaned.contains(&a.id))
        .map(|a| Finding {
            resource_type: a.resource_type,
            resource_id: a.id.clone(),
            verdict: Verdict::Orphaned,
            reason_code: UNASSOCIATED_ADDRESS.to_string(),
            metrics: MetricBundle::new(),
            attributes: a.attributes.clone(),
        })
        .collect()
}
