//! Azure topology collection through the `az` CLI.
//!
//! This module handles all Azure-related operations:
//! - [`cli`] - Command execution for Azure CLI
//! - [`subscriptions`] - Subscription discovery (all, one id, or a management group)
//! - [`network`] - Virtual networks and subnets per subscription
//! - [`graph`] - Azure Resource Graph queries (frontend IP configurations)
//! - [`collector`] - Bounded, concurrent scan producing utilization records

pub mod cli;
mod collector;
pub mod graph;
pub mod network;
pub mod subscriptions;

use crate::config::SubscriptionSelector;
use crate::models::{SubscriptionRef, SubscriptionScope, VirtualNetwork};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

pub use collector::{collect_snapshot, discover_scopes, CollectorSettings};

/// Result type for Azure calls. The error is `Send` so calls can run concurrently.
pub type AzResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Which subscriptions a run covers, resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionSource {
    /// Every subscription the signed-in identity can read.
    All,
    /// A single subscription id.
    Specific(String),
    /// Every subscription below a management group, found by id or display name.
    ManagementGroup {
        id: Option<String>,
        name: Option<String>,
    },
}

impl SubscriptionSource {
    pub fn from_selector(selector: &SubscriptionSelector) -> Result<SubscriptionSource, Box<dyn Error>> {
        if let Some(mg) = &selector.management_group {
            let id = mg.id.clone().filter(|s| !s.trim().is_empty());
            let name = mg.name.clone().filter(|s| !s.trim().is_empty());
            if id.is_none() && name.is_none() {
                return Err("azure.subscriptions.management_group needs an id or a name".into());
            }
            return Ok(SubscriptionSource::ManagementGroup { id, name });
        }
        if let Some(id) = selector.specific_id.as_ref().filter(|s| !s.trim().is_empty()) {
            return Ok(SubscriptionSource::Specific(id.trim().to_string()));
        }
        if selector.process_all {
            return Ok(SubscriptionSource::All);
        }
        Err("azure.subscriptions: set process_all, specific_id or management_group".into())
    }
}

/// Frontend IP configuration of a load balancer, gateway, firewall, bastion or
/// private-link service, attached to a subnet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FrontendIpConfig {
    pub ip_config_id: String,
    pub subnet_id: String,
    #[serde(default)]
    pub resource_type: String,
}

/// Where the topology comes from. Implemented over the `az` CLI and by fixtures in tests.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Subscriptions to scan, each with the management-group label it was found under.
    async fn subscriptions(&self, source: &SubscriptionSource) -> AzResult<Vec<SubscriptionScope>>;

    /// Virtual networks of one subscription, with their subnets and attachments.
    async fn virtual_networks(&self, subscription: &SubscriptionRef) -> AzResult<Vec<VirtualNetwork>>;

    /// Frontend IP configurations placed in subnets of one subscription.
    async fn frontend_ip_configs(&self, subscription: &SubscriptionRef) -> AzResult<Vec<FrontendIpConfig>>;
}

/// [`TopologySource`] backed by the signed-in `az` CLI.
#[derive(Debug, Clone, Default)]
pub struct AzCliSource;

impl AzCliSource {
    pub fn new() -> AzCliSource {
        AzCliSource
    }
}

#[async_trait]
impl TopologySource for AzCliSource {
    async fn subscriptions(&self, source: &SubscriptionSource) -> AzResult<Vec<SubscriptionScope>> {
        match source {
            SubscriptionSource::All => subscriptions::list_all().await,
            SubscriptionSource::Specific(id) => subscriptions::show(id).await.map(|s| vec![s]),
            SubscriptionSource::ManagementGroup { id, name } => {
                subscriptions::list_management_group(id.as_deref(), name.as_deref()).await
            }
        }
    }

    async fn virtual_networks(&self, subscription: &SubscriptionRef) -> AzResult<Vec<VirtualNetwork>> {
        network::list_virtual_networks(&subscription.subscription_id).await
    }

    async fn frontend_ip_configs(&self, subscription: &SubscriptionRef) -> AzResult<Vec<FrontendIpConfig>> {
        graph::frontend_ip_configs(&subscription.subscription_id).await
    }
}
