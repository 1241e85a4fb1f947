//! Inventory-of-record seam.
//!
//! The reconciler only talks to [`InventoryStore`]; NetBox and the in-memory store both
//! implement it. The store is shared with other writers, so none of these calls assume
//! exclusive access.

use crate::models::inventory::{
    Aggregate, AggregateSpec, NewPrefix, ObjectId, Prefix, PrefixPatch, Role, RoleSpec, Tag,
    TagSpec, Vrf, VrfSpec,
};
use crate::models::Cidr;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object already exists, typically created by another writer since our lookup.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Value type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFieldKind {
    Text,
    Url,
    Integer,
}

impl CustomFieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomFieldKind::Text => "text",
            CustomFieldKind::Url => "url",
            CustomFieldKind::Integer => "integer",
        }
    }
}

/// A custom field on prefixes, created when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldSpec {
    pub name: &'static str,
    pub kind: CustomFieldKind,
    pub description: &'static str,
}

impl CustomFieldSpec {
    /// Human label, e.g. `Ips Available` for `ips_available`.
    pub fn label(&self) -> String {
        self.name
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub const FIELD_SUBSCRIPTION: &str = "azure_subscription";
pub const FIELD_SUBSCRIPTION_URL: &str = "azure_subscription_url";
pub const FIELD_SUMMARY: &str = "list_available_ips";
pub const FIELD_IPS_USED: &str = "ips_used";
pub const FIELD_IPS_AVAILABLE: &str = "ips_available";
pub const FIELD_PARENT_AGGREGATE: &str = "parent_aggregate";

/// Custom fields holding [`crate::models::inventory::PrefixAttributes`].
pub const PREFIX_FIELDS: [CustomFieldSpec; 6] = [
    CustomFieldSpec {
        name: FIELD_SUBSCRIPTION,
        kind: CustomFieldKind::Text,
        description: "Azure subscription owning the address space",
    },
    CustomFieldSpec {
        name: FIELD_SUBSCRIPTION_URL,
        kind: CustomFieldKind::Url,
        description: "Azure portal link to the subscription",
    },
    CustomFieldSpec {
        name: FIELD_SUMMARY,
        kind: CustomFieldKind::Text,
        description: "IP utilization summary from the last Azure scan",
    },
    CustomFieldSpec {
        name: FIELD_IPS_USED,
        kind: CustomFieldKind::Integer,
        description: "IPs used in the address space",
    },
    CustomFieldSpec {
        name: FIELD_IPS_AVAILABLE,
        kind: CustomFieldKind::Integer,
        description: "IPs still available in the address space",
    },
    CustomFieldSpec {
        name: FIELD_PARENT_AGGREGATE,
        kind: CustomFieldKind::Text,
        description: "Aggregate the address space was matched under",
    },
];

/// Operations the reconciler needs from the inventory-of-record.
///
/// `ensure_*` calls are get-or-create keyed by slug, name or prefix. When the object
/// exists with fewer tags than requested, the missing tags are added; tags are never
/// removed.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Every prefix with exactly this CIDR, in any VRF.
    async fn find_prefixes(&self, prefix: &Cidr) -> StoreResult<Vec<Prefix>>;

    /// Create a prefix in the global table. [`StoreError::Conflict`] when it already exists.
    async fn create_prefix(&self, prefix: &NewPrefix) -> StoreResult<Prefix>;

    async fn update_prefix(&self, id: ObjectId, patch: &PrefixPatch) -> StoreResult<Prefix>;

    async fn ensure_tag(&self, spec: &TagSpec) -> StoreResult<Tag>;

    async fn ensure_custom_field(&self, spec: &CustomFieldSpec) -> StoreResult<()>;

    async fn ensure_aggregate(&self, spec: &AggregateSpec) -> StoreResult<Aggregate>;

    async fn ensure_role(&self, spec: &RoleSpec) -> StoreResult<Role>;

    async fn ensure_vrf(&self, spec: &VrfSpec) -> StoreResult<Vrf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_labels() {
        assert_eq!(PREFIX_FIELDS[0].label(), "Azure Subscription");
        assert_eq!(PREFIX_FIELDS[2].label(), "List Available Ips");
        assert_eq!(PREFIX_FIELDS[3].kind.as_str(), "integer");
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Api {
            status: 400,
            body: "{\"prefix\": [\"bad\"]}".to_string(),
        };
        assert!(err.to_string().starts_with("API returned 400"));
    }
}
