//! Per-address-space utilization records produced by a scan.

use super::Cidr;
use serde::{Deserialize, Serialize};

/// One computed row per address space. Created once per run and never mutated afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UtilizationRecord {
    /// Management group label the subscription was found under.
    pub management_group: String,
    pub subscription_id: String,
    pub subscription_name: String,
    pub vnet_name: String,
    /// Azure region of the owning network.
    pub region: String,
    pub address_space: Cidr,
    pub subnet_count: usize,
    pub used: u64,
    pub available: u128,
}

/// Column header for [`UtilizationRecord`] rows, in output order.
pub const RECORD_COLUMNS: [&str; 9] = [
    "management_group",
    "subscription_id",
    "subscription_name",
    "vnet_name",
    "region",
    "address_space",
    "subnet_count",
    "ips_used",
    "ips_available",
];

impl UtilizationRecord {
    /// Field values in [`RECORD_COLUMNS`] order.
    pub fn columns(&self) -> [String; 9] {
        [
            self.management_group.clone(),
            self.subscription_id.clone(),
            self.subscription_name.clone(),
            self.vnet_name.clone(),
            self.region.clone(),
            self.address_space.to_string(),
            self.subnet_count.to_string(),
            self.used.to_string(),
            self.available.to_string(),
        ]
    }
}
