//! Azure Virtual Network (VNet) data model.

use super::{Cidr, Family, Subnet, SubnetUsage, SubnetUsageMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents an Azure Virtual Network with its address spaces and subnets.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VirtualNetwork {
    /// Name of the virtual network.
    pub name: String,
    /// Full Azure resource id.
    pub id: String,
    /// Resource group, taken from the resource id.
    pub resource_group: String,
    /// Azure region location.
    pub location: String,
    /// Address spaces declared on the network, unparsed.
    pub address_spaces: Vec<String>,
    /// Subnets within this VNet.
    pub subnets: Vec<Subnet>,
}

impl VirtualNetwork {
    /// Build the calculator input for every subnet prefix of this network.
    ///
    /// A subnet with several prefixes yields one observation per prefix under the same
    /// subnet id. Its attachments are attributed to its first IPv4 prefix, or to the first
    /// prefix when it has none, whatever order Azure lists them in.
    pub fn subnet_usages(&self, usage: &SubnetUsageMap) -> Vec<SubnetUsage> {
        let mut usages = Vec::new();
        for subnet in &self.subnets {
            let used = usage.used(&subnet.id);
            let owner = subnet
                .address_prefixes
                .iter()
                .position(|p| Cidr::new(p).is_ok_and(|c| c.family() == Family::V4))
                .unwrap_or(0);
            for (i, prefix) in subnet.address_prefixes.iter().enumerate() {
                usages.push(SubnetUsage {
                    subnet_id: subnet.id.clone(),
                    cidr: prefix.clone(),
                    used: if i == owner { used } else { 0 },
                });
            }
        }
        usages
    }
}

/// Resource group segment of an Azure resource id (`/subscriptions/x/resourceGroups/<rg>/...`).
pub fn resource_group_of(resource_id: &str) -> String {
    let mut parts = resource_id.split('/');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("resourceGroups") {
            return parts.next().unwrap_or_default().to_string();
        }
    }
    String::new()
}

impl fmt::Display for VirtualNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({} subnets, {})",
            self.name,
            self.address_spaces.join(", "),
            self.subnets.len(),
            self.location
        )
    }
}
