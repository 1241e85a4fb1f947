//! Topology scan: subscriptions in parallel, each one walked sequentially.
//!
//! Per subscription: networks, then filters, then frontend IP configurations, then one
//! [`UtilizationRecord`] per address space. Every remote call is bounded by a timeout
//! and retried once; a call that still fails counts as an empty answer for that
//! subscription so the rest of the scan goes on.

use super::{AzResult, SubscriptionSource, TopologySource};
use crate::config::{self, RunSettings};
use crate::models::{Cidr, SubnetUsageMap, SubscriptionScope, UtilizationRecord, VirtualNetwork};
use crate::processing::{compute_utilization, NetworkFilter, UtilizationPolicy};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Attempts per remote call before degrading to an empty answer.
const ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Subscriptions scanned at the same time, at least 1.
    pub concurrency: usize,
    /// Upper bound for one remote call.
    pub timeout: Duration,
    /// Pause before retrying a failed call.
    pub retry_pause: Duration,
    pub frontend_ips: bool,
    pub policy: UtilizationPolicy,
}

impl CollectorSettings {
    pub fn from_run(settings: &RunSettings) -> CollectorSettings {
        CollectorSettings {
            concurrency: settings.concurrency.max(1),
            timeout: settings.azure_timeout,
            retry_pause: Duration::from_millis(config::SLEEP_MSEC * 5),
            frontend_ips: settings.frontend_ips,
            policy: settings.policy,
        }
    }
}

/// Run a remote call under a timeout, retrying once. `None` when every attempt failed.
async fn bounded<T, F, Fut>(what: &str, settings: &CollectorSettings, mut call: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AzResult<T>>,
{
    for attempt in 1..=ATTEMPTS {
        match tokio::time::timeout(settings.timeout, call()).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => log::warn!("{what} failed (attempt {attempt}/{ATTEMPTS}): {e}"),
            Err(_) => log::warn!(
                "{what} timed out after {}s (attempt {attempt}/{ATTEMPTS})",
                settings.timeout.as_secs_f32()
            ),
        }
        if attempt < ATTEMPTS {
            tokio::time::sleep(settings.retry_pause).await;
        }
    }
    None
}

/// Resolve the subscriptions to scan. Fails the run when none can be listed.
pub async fn discover_scopes<S: TopologySource + ?Sized>(
    source: &S,
    selector: &SubscriptionSource,
    settings: &CollectorSettings,
) -> AzResult<Vec<SubscriptionScope>> {
    let scopes = bounded("Subscription discovery", settings, || source.subscriptions(selector))
        .await
        .ok_or("Could not list subscriptions")?;

    // A subscription can be reachable through more than one path
    let mut seen = std::collections::HashSet::new();
    let scopes: Vec<SubscriptionScope> = scopes
        .into_iter()
        .filter(|s| seen.insert(s.subscription.subscription_id.to_lowercase()))
        .collect();
    log::info!("{} subscriptions to scan", scopes.len());
    Ok(scopes)
}

/// Scan every subscription and compute one record per address space.
///
/// Records come back sorted by subscription, network and address space so output is
/// stable whatever order the subscriptions finished in.
pub async fn collect_snapshot<S: TopologySource + ?Sized>(
    source: &S,
    scopes: Vec<SubscriptionScope>,
    filter: &NetworkFilter,
    settings: &CollectorSettings,
) -> Vec<UtilizationRecord> {
    let mut records: Vec<UtilizationRecord> = stream::iter(scopes)
        .map(|scope| collect_subscription(source, scope, filter, settings))
        .buffer_unordered(settings.concurrency.max(1))
        .collect::<Vec<Vec<UtilizationRecord>>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    records.sort_by(|a, b| {
        (&a.subscription_name, &a.subscription_id, &a.vnet_name, &a.address_space).cmp(&(
            &b.subscription_name,
            &b.subscription_id,
            &b.vnet_name,
            &b.address_space,
        ))
    });
    log::info!("Scan produced {} address-space records", records.len());
    records
}

async fn collect_subscription<S: TopologySource + ?Sized>(
    source: &S,
    scope: SubscriptionScope,
    filter: &NetworkFilter,
    settings: &CollectorSettings,
) -> Vec<UtilizationRecord> {
    let subscription = &scope.subscription;
    log::info!("Scanning subscription {}", subscription.to_string().on_blue());

    let vnets = bounded(&format!("Listing VNets of {subscription}"), settings, || {
        source.virtual_networks(subscription)
    })
    .await
    .unwrap_or_default();
    let vnets = filter.apply(vnets);
    if vnets.is_empty() {
        log::info!("No VNets to process in {subscription}");
        return vec![];
    }

    let mut usage = SubnetUsageMap::new();
    for vnet in &vnets {
        for subnet in &vnet.subnets {
            for attachment in &subnet.attachment_ids {
                usage.record(&subnet.id, attachment);
            }
        }
    }

    if settings.frontend_ips {
        let frontends = bounded(
            &format!("Listing frontend IPs of {subscription}"),
            settings,
            || source.frontend_ip_configs(subscription),
        )
        .await
        .unwrap_or_default();
        let added = frontends
            .iter()
            .filter(|f| usage.record(&f.subnet_id, &f.ip_config_id))
            .count();
        log::debug!(
            "{added} of {} frontend IP configurations not already counted",
            frontends.len()
        );
    }

    vnets
        .iter()
        .flat_map(|vnet| records_for_vnet(&scope, vnet, &usage, &settings.policy))
        .collect()
}

/// One record per parseable address space of a network.
///
/// A bad address-space CIDR skips that row with a warning.
// Subnets come from the owning network only, not from the whole scan: a CIDR declared by
// two networks must not count the other network's subnets twice.
pub(crate) fn records_for_vnet(
    scope: &SubscriptionScope,
    vnet: &VirtualNetwork,
    usage: &SubnetUsageMap,
    policy: &UtilizationPolicy,
) -> Vec<UtilizationRecord> {
    let observations = vnet.subnet_usages(usage);
    let mut records = Vec::with_capacity(vnet.address_spaces.len());
    for space in &vnet.address_spaces {
        let address_space = match Cidr::new(space) {
            Ok(cidr) => cidr,
            Err(e) => {
                log::warn!("Skipping address space '{space}' of VNet {}: {e}", vnet.name);
                continue;
            }
        };
        let totals = compute_utilization(&address_space, &observations, policy);
        log::debug!(
            "{} {address_space}: subnets={} used={} available={}",
            vnet.name,
            totals.subnet_count,
            totals.used,
            totals.available
        );
        records.push(UtilizationRecord {
            management_group: scope.management_group.clone(),
            subscription_id: scope.subscription.subscription_id.clone(),
            subscription_name: scope.subscription.display_name.clone(),
            vnet_name: vnet.name.clone(),
            region: vnet.location.clone(),
            address_space,
            subnet_count: totals.subnet_count,
            used: totals.used,
            available: totals.available,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::FrontendIpConfig;
    use crate::models::{Subnet, SubscriptionRef};
    use crate::processing::filters::{FilterConfig, NamePatterns};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scope(id: &str, name: &str) -> SubscriptionScope {
        SubscriptionScope {
            management_group: "-".to_string(),
            subscription: SubscriptionRef {
                subscription_id: id.to_string(),
                display_name: name.to_string(),
            },
        }
    }

    fn settings() -> CollectorSettings {
        CollectorSettings {
            concurrency: 2,
            timeout: Duration::from_millis(200),
            retry_pause: Duration::from_millis(1),
            frontend_ips: true,
            policy: UtilizationPolicy::default(),
        }
    }

    fn hub() -> VirtualNetwork {
        VirtualNetwork {
            name: "hub".to_string(),
            location: "westeurope".to_string(),
            address_spaces: vec!["10.2.0.0/24".to_string(), "not-a-cidr".to_string()],
            subnets: vec![
                Subnet {
                    name: "a".to_string(),
                    id: "/hub/subnets/a".to_string(),
                    address_prefixes: vec!["10.2.0.0/25".to_string()],
                    attachment_ids: (0..10).map(|i| format!("/nic{i}/ipconfig")).collect(),
                },
                Subnet {
                    name: "b".to_string(),
                    id: "/hub/subnets/b".to_string(),
                    address_prefixes: vec!["10.2.0.128/25".to_string()],
                    attachment_ids: vec![],
                },
            ],
            ..Default::default()
        }
    }

    /// Fixture source: "s1" has the hub network, "flaky" fails once then answers,
    /// "down" never answers in time.
    struct FakeSource {
        flaky_calls: AtomicUsize,
    }

    #[async_trait]
    impl TopologySource for FakeSource {
        async fn subscriptions(&self, _: &SubscriptionSource) -> AzResult<Vec<SubscriptionScope>> {
            Ok(vec![scope("s1", "One"), scope("S1", "One again"), scope("flaky", "Flaky")])
        }

        async fn virtual_networks(&self, sub: &SubscriptionRef) -> AzResult<Vec<VirtualNetwork>> {
            match sub.subscription_id.as_str() {
                "s1" => Ok(vec![hub()]),
                "flaky" => {
                    if self.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err("throttled".into());
                    }
                    Ok(vec![VirtualNetwork {
                        name: "spoke".to_string(),
                        address_spaces: vec!["10.1.0.0/24".to_string()],
                        ..Default::default()
                    }])
                }
                _ => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(vec![hub()])
                }
            }
        }

        async fn frontend_ip_configs(&self, sub: &SubscriptionRef) -> AzResult<Vec<FrontendIpConfig>> {
            if sub.subscription_id != "s1" {
                return Ok(vec![]);
            }
            Ok(vec![
                // already counted through the NIC listing, different case
                FrontendIpConfig {
                    ip_config_id: "/NIC0/IPCONFIG".to_string(),
                    subnet_id: "/HUB/subnets/a".to_string(),
                    resource_type: String::new(),
                },
                FrontendIpConfig {
                    ip_config_id: "/lb/frontend1".to_string(),
                    subnet_id: "/hub/subnets/b".to_string(),
                    resource_type: "microsoft.network/loadbalancers".to_string(),
                },
            ])
        }
    }

    #[test]
    fn test_records_for_vnet() {
        let mut usage = SubnetUsageMap::new();
        for subnet in &hub().subnets {
            for a in &subnet.attachment_ids {
                usage.record(&subnet.id, a);
            }
        }
        let records = records_for_vnet(&scope("s1", "One"), &hub(), &usage, &UtilizationPolicy::default());
        // the bad address space is skipped
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subnet_count, 2);
        assert_eq!(records[0].used, 10);
        assert_eq!(records[0].available, 236);
    }

    #[tokio::test]
    async fn test_discover_dedups_subscriptions() {
        let source = FakeSource { flaky_calls: AtomicUsize::new(0) };
        let scopes = discover_scopes(&source, &SubscriptionSource::All, &settings())
            .await
            .unwrap();
        assert_eq!(scopes.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_snapshot_retries_and_degrades() {
        let source = FakeSource { flaky_calls: AtomicUsize::new(0) };
        let scopes = vec![scope("s1", "One"), scope("flaky", "Flaky"), scope("down", "Down")];
        let records =
            collect_snapshot(&source, scopes, &NetworkFilter::default(), &settings()).await;

        // "down" timed out twice and contributes nothing
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subscription_name, "Flaky");
        assert_eq!(records[0].subnet_count, 0);
        assert_eq!(records[0].available, 251);

        assert_eq!(records[1].subscription_name, "One");
        // 10 NICs plus one new load-balancer frontend
        assert_eq!(records[1].used, 11);
        assert_eq!(records[1].available, 235);
        assert_eq!(source.flaky_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_name_filter_keeps_subnet_usage() {
        let source = FakeSource { flaky_calls: AtomicUsize::new(0) };
        // selects the network by name; its subnets "a" and "b" do not match
        let filter = NetworkFilter::new(&FilterConfig {
            resource_names: NamePatterns {
                include_patterns: vec!["^hub$".to_string()],
                exclude_patterns: vec![],
            },
            ..Default::default()
        })
        .unwrap();
        let records = collect_snapshot(&source, vec![scope("s1", "One")], &filter, &settings()).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subnet_count, 2);
        assert_eq!(records[0].used, 11);
        assert_eq!(records[0].available, 235);
    }
}
