//! Configuration file loading and pre-flight checks.
//!
//! The YAML file is optional: every section has a default, and `NETBOX_URL` /
//! `NETBOX_TOKEN` from the environment override the `netbox` section.
//! [`Config::prepare`] turns the raw file into [`RunSettings`], correcting what it can
//! with a warning and failing before any remote call when it can't.

use crate::azure::SubscriptionSource;
use crate::models::inventory::TagSpec;
use crate::models::Cidr;
use crate::netbox::NetBoxConfig;
use crate::processing::{slugify, FilterConfig, NetworkFilter, Thresholds, UtilizationPolicy};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::time::Duration;

/// Pause between paged Azure Resource Graph requests.
pub const SLEEP_MSEC: u64 = 200;

/// Config file used when `AZURE_IP_SYNC_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub netbox: NetBoxConfig,
    pub azure: AzureConfig,
    pub utilization: UtilizationPolicy,
    pub thresholds: Thresholds,
    pub reconcile: ReconcileConfig,
    pub tags: TagsConfig,
    pub aggregates: Vec<AggregateConfig>,
    pub roles: Vec<RoleConfig>,
    pub filters: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            netbox: NetBoxConfig::default(),
            azure: AzureConfig::default(),
            utilization: UtilizationPolicy::default(),
            thresholds: Thresholds::default(),
            reconcile: ReconcileConfig::default(),
            tags: TagsConfig::default(),
            aggregates: vec![],
            roles: default_roles(),
            filters: FilterConfig::default(),
        }
    }
}

/// Environment roles detected from subscription names.
fn default_roles() -> Vec<RoleConfig> {
    ["dev", "hml", "uat", "prd"]
        .iter()
        .map(|env| RoleConfig {
            name: env.to_uppercase(),
            slug: env.to_string(),
            match_on: env.to_string(),
            tags: vec![env.to_string()],
        })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementGroupSelector {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Which subscriptions to scan. A management group wins over a specific id, which wins
/// over `process_all`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SubscriptionSelector {
    pub process_all: bool,
    pub specific_id: Option<String>,
    pub management_group: Option<ManagementGroupSelector>,
}

impl Default for SubscriptionSelector {
    fn default() -> Self {
        SubscriptionSelector {
            process_all: true,
            specific_id: None,
            management_group: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AzureConfig {
    pub subscriptions: SubscriptionSelector,
    /// Subscriptions scanned at the same time.
    pub concurrency: usize,
    /// Upper bound for one Azure call, in seconds.
    pub timeout_secs: u64,
    /// Also count frontend IPs of load balancers, gateways, firewalls, bastions and
    /// private-link services.
    pub frontend_ips: bool,
}

impl Default for AzureConfig {
    fn default() -> Self {
        AzureConfig {
            subscriptions: SubscriptionSelector::default(),
            concurrency: 4,
            timeout_secs: 60,
            frontend_ips: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Create a container prefix for address spaces missing from the inventory.
    pub create_missing: bool,
    /// Skip CIDRs that match more than one inventory prefix.
    pub strict_unique: bool,
    /// Log planned changes without writing.
    pub dry_run: bool,
    /// Ensure one VRF per subscription.
    pub routing_domains: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TagsConfig {
    pub sync_tag: TagSpec,
    /// Tag slugs added to every reconciled prefix.
    pub additional_tags: Vec<String>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        TagsConfig {
            sync_tag: TagSpec {
                name: "azure-sync".to_string(),
                slug: "azure-sync".to_string(),
                description: "Synced from Azure".to_string(),
            },
            additional_tags: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AggregateConfig {
    pub prefix: String,
    #[serde(default = "default_rir")]
    pub rir: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_rir() -> String {
    "rfc-1918".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Substring looked up in the subscription display name, case-insensitive.
    #[serde(default, rename = "match")]
    pub match_on: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Aggregate definition after pre-flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSetting {
    pub prefix: Cidr,
    pub rir: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Role definition after pre-flight. `match_on` is lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSetting {
    pub name: String,
    pub slug: String,
    pub match_on: String,
    pub tags: Vec<String>,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub netbox: NetBoxConfig,
    pub subscriptions: SubscriptionSource,
    pub concurrency: usize,
    pub azure_timeout: Duration,
    pub frontend_ips: bool,
    pub policy: UtilizationPolicy,
    pub thresholds: Thresholds,
    pub reconcile: ReconcileConfig,
    pub sync_tag: TagSpec,
    pub additional_tags: Vec<String>,
    pub aggregates: Vec<AggregateSetting>,
    pub roles: Vec<RoleSetting>,
    pub filter: NetworkFilter,
}

impl Config {
    /// Load the configuration file, falling back to defaults when it does not exist.
    pub fn load(path: &str) -> Result<Config, Box<dyn Error>> {
        let mut config = if Path::new(path).exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Error reading config file {path}: {e}"))?;
            let config = Config::from_yaml(&text)
                .map_err(|e| format!("Error in config file {path}: {e}"))?;
            log::info!("Configuration loaded from {}", path.on_blue());
            config
        } else {
            log::warn!("Config file {path} not found, using defaults");
            Config::default()
        };

        if let Ok(url) = std::env::var("NETBOX_URL") {
            config.netbox.url = url;
        }
        if let Ok(token) = std::env::var("NETBOX_TOKEN") {
            config.netbox.token = token;
        }
        Ok(config)
    }

    /// Parse YAML, reporting the path of the offending key on error.
    pub fn from_yaml(text: &str) -> Result<Config, Box<dyn Error>> {
        let deserializer = serde_yaml::Deserializer::from_str(text);
        let config: Config = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| format!("path={} error={}", e.path(), e.inner()))?;
        Ok(config)
    }

    /// Pre-flight: validate and normalise before any remote call.
    pub fn prepare(self) -> Result<RunSettings, Box<dyn Error>> {
        let subscriptions = SubscriptionSource::from_selector(&self.azure.subscriptions)?;

        if !self.reconcile.dry_run && (self.netbox.url.is_empty() || self.netbox.token.is_empty())
        {
            return Err("NetBox URL and token must be provided (config or NETBOX_URL/NETBOX_TOKEN)".into());
        }

        let concurrency = if self.azure.concurrency == 0 {
            log::warn!("azure.concurrency is 0, using 1");
            1
        } else {
            self.azure.concurrency
        };

        let mut aggregates = Vec::with_capacity(self.aggregates.len());
        for agg in self.aggregates {
            let prefix = Cidr::new(&agg.prefix)
                .map_err(|e| format!("Invalid aggregate prefix '{}': {e}", agg.prefix))?;
            aggregates.push(AggregateSetting {
                prefix,
                rir: agg.rir,
                description: agg.description,
                tags: agg.tags,
            });
        }

        let mut roles = Vec::with_capacity(self.roles.len());
        for role in self.roles {
            let slug = if role.slug.is_empty() {
                slugify(&role.name)
            } else {
                role.slug
            };
            let match_on = if role.match_on.is_empty() {
                slug.clone()
            } else {
                role.match_on
            };
            if match_on.trim().is_empty() {
                log::warn!("Role '{}' has nothing to match on, ignoring it", role.name);
                continue;
            }
            roles.push(RoleSetting {
                name: role.name,
                slug,
                match_on: match_on.to_lowercase(),
                tags: role.tags,
            });
        }

        let sync_tag = if self.tags.sync_tag.slug.is_empty() {
            let slug = slugify(&self.tags.sync_tag.name);
            if slug.is_empty() {
                return Err("tags.sync_tag needs a name or slug".into());
            }
            TagSpec {
                slug,
                ..self.tags.sync_tag
            }
        } else {
            self.tags.sync_tag
        };

        Ok(RunSettings {
            netbox: self.netbox,
            subscriptions,
            concurrency,
            azure_timeout: Duration::from_secs(self.azure.timeout_secs.max(1)),
            frontend_ips: self.azure.frontend_ips,
            policy: self.utilization,
            thresholds: self.thresholds.normalized(),
            reconcile: self.reconcile,
            sync_tag,
            additional_tags: self.tags.additional_tags,
            aggregates,
            roles,
            filter: NetworkFilter::new(&self.filters)?,
        })
    }
}
