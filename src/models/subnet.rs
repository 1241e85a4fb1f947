//! Azure subnet data model and per-subnet usage accounting.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Represents an Azure subnet as listed under its virtual network.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Subnet {
    /// Name of the subnet.
    pub name: String,
    /// Full Azure resource id of the subnet.
    pub id: String,
    /// CIDR blocks of the subnet, as returned by Azure (usually one, two for dual stack).
    pub address_prefixes: Vec<String>,
    /// Ids of the interface ip configurations attached to this subnet.
    pub attachment_ids: Vec<String>,
}

/// One (subnet id, subnet CIDR, used count) observation fed to the calculator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubnetUsage {
    pub subnet_id: String,
    pub cidr: String,
    pub used: u64,
}

/// Address-consuming attachments seen per subnet during a scan.
///
/// Keys and attachment ids are compared case-insensitively, as Azure returns resource ids
/// with inconsistent casing between APIs. An attachment reported by more than one
/// enumeration source is counted once.
#[derive(Debug, Default, Clone)]
pub struct SubnetUsageMap {
    seen: HashMap<String, HashSet<String>>,
}

impl SubnetUsageMap {
    pub fn new() -> SubnetUsageMap {
        SubnetUsageMap::default()
    }

    /// Record an attachment on a subnet. Returns false if it was already counted.
    pub fn record(&mut self, subnet_id: &str, attachment_id: &str) -> bool {
        self.seen
            .entry(subnet_id.to_lowercase())
            .or_default()
            .insert(attachment_id.to_lowercase())
    }

    /// Number of distinct attachments recorded for a subnet.
    pub fn used(&self, subnet_id: &str) -> u64 {
        self.seen
            .get(&subnet_id.to_lowercase())
            .map(|ids| ids.len() as u64)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
