//! Shared address-space detection.
//!
//! Detects the same address-space CIDR declared by more than one network. Such records
//! all reconcile onto the same inventory prefix, so the last one processed wins.

use crate::models::{Cidr, UtilizationRecord};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Networks declaring the same address space.
#[derive(Debug)]
pub struct OverlapConflict<'a> {
    pub cidr: Cidr,
    pub records: Vec<&'a UtilizationRecord>,
}

/// Find address spaces used by more than one network.
pub fn find_shared_address_spaces(records: &[UtilizationRecord]) -> Vec<OverlapConflict<'_>> {
    let mut by_cidr: BTreeMap<Cidr, Vec<&UtilizationRecord>> = BTreeMap::new();
    for record in records {
        by_cidr.entry(record.address_space).or_default().push(record);
    }

    // BTreeMap keeps the output sorted by CIDR
    by_cidr
        .into_iter()
        .filter(|(_, recs)| {
            recs.iter()
                .map(|r| (&r.subscription_id, &r.vnet_name))
                .unique()
                .count()
                > 1
        })
        .map(|(cidr, records)| OverlapConflict { cidr, records })
        .collect()
}

/// Log shared address spaces as warnings.
pub fn log_shared_address_spaces(conflicts: &[OverlapConflict<'_>]) {
    if conflicts.is_empty() {
        log::info!("No shared address spaces found.");
        return;
    }

    log::warn!(
        "Found {} address space(s) declared by more than one VNet:",
        conflicts.len()
    );
    for conflict in conflicts {
        log::warn!(
            "  {} is used by {} VNets: {}",
            conflict.cidr,
            conflict.records.len(),
            conflict
                .records
                .iter()
                .map(|r| format!("'{}' in '{}'", r.vnet_name, r.subscription_name))
                .join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sub: &str, vnet: &str, cidr: &str) -> UtilizationRecord {
        UtilizationRecord {
            management_group: "mg".to_string(),
            subscription_id: sub.to_string(),
            subscription_name: format!("name-{sub}"),
            vnet_name: vnet.to_string(),
            region: "westeurope".to_string(),
            address_space: Cidr::new(cidr).unwrap(),
            subnet_count: 0,
            used: 0,
            available: 0,
        }
    }

    #[test]
    fn test_find_shared_address_spaces() {
        let records = vec![
            record("s1", "hub", "10.0.0.0/16"),
            record("s2", "spoke", "10.0.0.0/16"),
            record("s2", "spoke", "10.1.0.0/16"),
            record("s3", "other", "10.2.0.0/16"),
        ];
        let conflicts = find_shared_address_spaces(&records);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].cidr.to_string(), "10.0.0.0/16");
        assert_eq!(conflicts[0].records.len(), 2);
        log_shared_address_spaces(&conflicts);
    }

    #[test]
    fn test_same_network_twice_is_not_shared() {
        let records = vec![
            record("s1", "hub", "10.0.0.0/16"),
            record("s1", "hub", "10.0.0.0/16"),
        ];
        assert!(find_shared_address_spaces(&records).is_empty());
    }
}
