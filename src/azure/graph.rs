//! Azure Resource Graph query execution.
//!
//! Handles paged `az graph query` calls, used here to find frontend IP configurations
//! that take addresses from a subnet without going through a network interface.

use super::{cli, AzResult, FrontendIpConfig};
use crate::config;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Rows requested per page.
const PAGE_SIZE: u32 = 1000;

/// Frontend IP configurations of load balancers, application gateways, firewalls,
/// bastions and private-link services, one row per configuration placed in a subnet.
/// Double quotes only: the query is passed inside single quotes.
const FRONTEND_QUERY: &str = r#"resources
        | where type in~ ("microsoft.network/loadbalancers", "microsoft.network/applicationgateways", "microsoft.network/azurefirewalls", "microsoft.network/bastionhosts", "microsoft.network/privatelinkservices")
        | extend configs = coalesce(properties.frontendIPConfigurations, properties.frontendIpConfigurations, properties.ipConfigurations)
        | mv-expand config = configs
        | project ip_config_id = tostring(config.id)
                ,subnet_id = tostring(config.properties.subnet.id)
                ,resource_type = type
        | where isnotempty(subnet_id) and isnotempty(ip_config_id)"#;

/// One page of `az graph query` output.
#[derive(Deserialize, Debug)]
pub struct GraphPage<T> {
    pub data: Vec<T>,
    /// Token for the next page, absent on the last one.
    #[serde(default)]
    pub skip_token: Option<String>,
    /// Total number of records matching the query.
    #[serde(default)]
    pub total_records: Option<u64>,
    #[serde(default)]
    pub count: u64,
}

/// Run a Resource Graph query scoped to one subscription, following skip tokens.
pub async fn query_all<T: DeserializeOwned>(query: &str, subscription_id: &str) -> AzResult<Vec<T>> {
    let mut rows: Vec<T> = Vec::new();
    let mut skip_token: Option<String> = None;
    let mut block = 0;

    loop {
        let skip_param = skip_token
            .as_ref()
            .map(|t| format!("--skip-token {t} "))
            .unwrap_or_default();
        let cmd = format!(
            "az graph query --first {PAGE_SIZE} --subscriptions {subscription_id} {skip_param}-q '{query}' --output json"
        );
        let page: GraphPage<T> = cli::run_json(&cmd).await?;

        log::debug!(
            "got block#{block:2} record_count=+{count:3} => {total:3} of {expected:?}",
            count = page.count,
            total = rows.len() + page.data.len(),
            expected = page.total_records,
        );
        rows.extend(page.data);
        block += 1;

        match page.skip_token {
            Some(next) if !next.is_empty() => {
                if skip_token.as_deref() == Some(next.as_str()) {
                    return Err("Skip token not unique - possible infinite loop".into());
                }
                skip_token = Some(next);
                // Rate limiting pause
                tokio::time::sleep(std::time::Duration::from_millis(config::SLEEP_MSEC)).await;
            }
            _ => break,
        }
    }

    Ok(rows)
}

/// Frontend IP configurations in subnets of one subscription.
pub async fn frontend_ip_configs(subscription_id: &str) -> AzResult<Vec<FrontendIpConfig>> {
    let configs: Vec<FrontendIpConfig> = query_all(FRONTEND_QUERY, subscription_id).await?;
    log::info!(
        "{} frontend IP configurations found in subscription {subscription_id}",
        configs.len()
    );
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str) -> GraphPage<FrontendIpConfig> {
        let json = std::fs::read_to_string(format!("src/tests/test_data/{name}"))
            .expect("Failed to read test fixture");
        cli::parse_json(&json).unwrap()
    }

    #[test]
    fn test_query_has_no_single_quotes() {
        assert!(!FRONTEND_QUERY.contains('\''));
    }

    #[test]
    fn test_parse_pages() {
        let first = page("graph_frontend_page1.json");
        assert_eq!(first.data.len(), 2);
        assert_eq!(first.total_records, Some(3));
        assert!(first.skip_token.is_some());
        assert_eq!(first.data[0].resource_type, "microsoft.network/loadbalancers");

        let last = page("graph_frontend_page2.json");
        assert_eq!(last.count, 1);
        assert!(last.skip_token.is_none());
        assert!(last.data[0].subnet_id.ends_with("/subnets/AzureBastionSubnet"));
    }
}
