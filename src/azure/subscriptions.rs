//! Subscription discovery.
//!
//! Three modes: every subscription visible to the signed-in identity, one subscription id,
//! or a management group walked recursively. Every mode yields the same
//! [`SubscriptionScope`] shape, labelled with the nearest management group when known.

use super::{cli, AzResult};
use crate::models::{SubscriptionRef, SubscriptionScope};
use colored::Colorize;
use serde::Deserialize;

/// Management-group label for subscriptions not found through a management group.
pub const NO_MANAGEMENT_GROUP: &str = "-";

/// One entry of `az account list` / `az account show`.
#[derive(Deserialize, Debug, Clone)]
pub struct AccountEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
}

impl AccountEntry {
    fn into_scope(self) -> SubscriptionScope {
        SubscriptionScope {
            management_group: NO_MANAGEMENT_GROUP.to_string(),
            subscription: SubscriptionRef {
                subscription_id: self.id,
                display_name: self.name,
            },
        }
    }
}

/// Node of `az account management-group show --expand --recurse`.
#[derive(Deserialize, Debug, Clone)]
pub struct ManagementGroupNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub children: Option<Vec<ManagementGroupNode>>,
}

impl ManagementGroupNode {
    fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    // "/subscriptions" on older CLI versions, "Microsoft.Management/managementGroups/subscriptions" on newer
    fn is_subscription(&self) -> bool {
        self.node_type.to_lowercase().ends_with("/subscriptions")
    }

    fn is_management_group(&self) -> bool {
        !self.is_subscription() && self.node_type.to_lowercase().contains("managementgroups")
    }
}

/// Keep enabled subscriptions from an `az account list` answer.
pub fn enabled_subscriptions(accounts: Vec<AccountEntry>) -> Vec<SubscriptionScope> {
    accounts
        .into_iter()
        .filter(|a| {
            let enabled = a.state.is_empty() || a.state.eq_ignore_ascii_case("Enabled");
            if !enabled {
                log::info!("Skipping subscription '{}' in state {}", a.name, a.state);
            }
            enabled
        })
        .map(AccountEntry::into_scope)
        .collect()
}

/// Collect the subscriptions below a management-group node, depth first.
///
/// Each subscription is labelled with the display name of the group directly above it.
pub fn extract_subscriptions(node: &ManagementGroupNode) -> Vec<SubscriptionScope> {
    let mut found = Vec::new();
    walk(node, &mut found);
    found
}

fn walk(node: &ManagementGroupNode, found: &mut Vec<SubscriptionScope>) {
    for child in node.children.iter().flatten() {
        if child.is_subscription() {
            log::debug!("Subscription found: {} ({}) in {}", child.label(), child.name, node.label());
            found.push(SubscriptionScope {
                management_group: node.label().to_string(),
                subscription: SubscriptionRef {
                    subscription_id: child.name.clone(),
                    display_name: child.label().to_string(),
                },
            });
        } else if child.is_management_group() {
            walk(child, found);
        } else {
            log::debug!("Ignoring management-group child {} of type {}", child.name, child.node_type);
        }
    }
}

/// Every subscription the signed-in identity can read.
pub async fn list_all() -> AzResult<Vec<SubscriptionScope>> {
    let accounts: Vec<AccountEntry> = cli::run_json("az account list --all --output json").await?;
    let scopes = enabled_subscriptions(accounts);
    log::info!("{} subscriptions found", scopes.len());
    Ok(scopes)
}

/// A single subscription by id.
pub async fn show(subscription_id: &str) -> AzResult<SubscriptionScope> {
    log::info!("Processing only subscription {}", subscription_id.on_blue());
    let cmd = format!("az account show --subscription {subscription_id} --output json");
    let account: AccountEntry = cli::run_json(&cmd).await?;
    Ok(account.into_scope())
}

/// Every subscription below a management group given by id or display name.
pub async fn list_management_group(
    id: Option<&str>,
    name: Option<&str>,
) -> AzResult<Vec<SubscriptionScope>> {
    let group_id = match (id, name) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => {
            log::info!("Looking up management group '{}'", name.on_blue());
            let groups: Vec<ManagementGroupNode> =
                cli::run_json("az account management-group list --output json").await?;
            find_group_id(&groups, name)
                .ok_or_else(|| format!("Management group '{name}' not found"))?
        }
        (None, None) => return Err("Management group id or name required".into()),
    };

    let cmd = format!(
        "az account management-group show --name {group_id} --expand --recurse --output json"
    );
    let root: ManagementGroupNode = cli::run_json(&cmd).await?;
    let scopes = extract_subscriptions(&root);
    log::info!(
        "{} subscriptions found in management group {}",
        scopes.len(),
        root.label().on_blue()
    );
    Ok(scopes)
}

/// Group id (`name`) of the group with the given display name.
pub fn find_group_id(groups: &[ManagementGroupNode], display_name: &str) -> Option<String> {
    groups
        .iter()
        .find(|g| g.display_name.as_deref().map(str::trim) == Some(display_name.trim()))
        .map(|g| g.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("src/tests/test_data/{name}"))
            .expect("Failed to read test fixture")
    }

    #[test]
    fn test_enabled_subscriptions() {
        let accounts: Vec<AccountEntry> = cli::parse_json(&fixture("account_list.json")).unwrap();
        let scopes = enabled_subscriptions(accounts);
        assert_eq!(scopes.len(), 2);
        assert!(scopes.iter().all(|s| s.management_group == NO_MANAGEMENT_GROUP));
        // same display name, different ids
        assert_eq!(scopes[0].subscription.display_name, scopes[1].subscription.display_name);
        assert_ne!(scopes[0].subscription.subscription_id, scopes[1].subscription.subscription_id);
    }

    #[test]
    fn test_extract_subscriptions_recursive() {
        let root: ManagementGroupNode =
            cli::parse_json(&fixture("management_group_show.json")).unwrap();
        let scopes = extract_subscriptions(&root);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].management_group, "Landing Zones");
        assert_eq!(scopes[0].subscription.display_name, "Connectivity Hub");
        assert_eq!(scopes[1].management_group, "Corp");
        assert_eq!(
            scopes[1].subscription.subscription_id,
            "9c8d7e6f-5a4b-4c3d-9e2f-1a0b9c8d7e6f"
        );
    }

    #[test]
    fn test_find_group_id() {
        let groups: Vec<ManagementGroupNode> =
            cli::parse_json(&fixture("management_group_list.json")).unwrap();
        assert_eq!(find_group_id(&groups, "Landing Zones"), Some("lz".to_string()));
        assert_eq!(find_group_id(&groups, "Nope"), None);
    }
}
