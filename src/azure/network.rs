//! Virtual networks and subnets of a subscription, from `az network vnet list`.

use super::{cli, AzResult};
use crate::models::{resource_group_of, Subnet, VirtualNetwork};
use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawAddressSpace {
    #[serde(default)]
    address_prefixes: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct RawResourceRef {
    id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawSubnet {
    name: String,
    id: String,
    #[serde(default)]
    address_prefix: Option<String>,
    #[serde(default)]
    address_prefixes: Option<Vec<String>>,
    #[serde(default)]
    ip_configurations: Option<Vec<RawResourceRef>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawVirtualNetwork {
    name: String,
    id: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    resource_group: Option<String>,
    #[serde(default)]
    address_space: Option<RawAddressSpace>,
    #[serde(default)]
    subnets: Option<Vec<RawSubnet>>,
}

impl From<RawSubnet> for Subnet {
    fn from(raw: RawSubnet) -> Self {
        // Single-stack subnets carry addressPrefix, dual-stack ones addressPrefixes
        let mut address_prefixes = raw.address_prefixes.unwrap_or_default();
        if let Some(prefix) = raw.address_prefix {
            if !address_prefixes.contains(&prefix) {
                address_prefixes.insert(0, prefix);
            }
        }
        Subnet {
            name: raw.name,
            id: raw.id,
            address_prefixes,
            attachment_ids: raw
                .ip_configurations
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.id)
                .collect(),
        }
    }
}

impl From<RawVirtualNetwork> for VirtualNetwork {
    fn from(raw: RawVirtualNetwork) -> Self {
        let resource_group = raw
            .resource_group
            .filter(|rg| !rg.is_empty())
            .unwrap_or_else(|| resource_group_of(&raw.id));
        VirtualNetwork {
            name: raw.name,
            id: raw.id,
            resource_group,
            location: raw.location,
            address_spaces: raw.address_space.unwrap_or_default().address_prefixes,
            subnets: raw
                .subnets
                .unwrap_or_default()
                .into_iter()
                .map(Subnet::from)
                .collect(),
        }
    }
}

/// Parse the JSON answer of `az network vnet list`.
pub fn parse_vnet_list(json: &str) -> Result<Vec<VirtualNetwork>, String> {
    let raw: Vec<RawVirtualNetwork> = cli::parse_json(json)?;
    Ok(raw.into_iter().map(VirtualNetwork::from).collect())
}

/// All virtual networks of a subscription.
pub async fn list_virtual_networks(subscription_id: &str) -> AzResult<Vec<VirtualNetwork>> {
    let cmd = format!("az network vnet list --subscription {subscription_id} --output json");
    let raw: Vec<RawVirtualNetwork> = cli::run_json(&cmd).await?;
    let vnets: Vec<VirtualNetwork> = raw.into_iter().map(VirtualNetwork::from).collect();
    log::info!(
        "{} VNets found in subscription {subscription_id}",
        vnets.len()
    );
    Ok(vnets)
}
