//! Inventory-of-record data model (prefixes, tags, aggregates, roles, VRFs).
//!
//! These types are store-agnostic: the NetBox client maps them onto its REST payloads and
//! the in-memory store keeps them as-is.

use super::Cidr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Store-assigned object id.
pub type ObjectId = u64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
}

/// Desired tag, looked up by slug and created if absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl TagSpec {
    /// Tag spec for a bare slug, named after it.
    pub fn from_slug(slug: &str) -> TagSpec {
        let mut chars = slug.chars();
        let name = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        TagSpec {
            name,
            slug: slug.to_string(),
            description: format!("Additional tag: {slug}"),
        }
    }
}

/// Broad CIDR used only as a containment anchor for tagging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub id: ObjectId,
    pub prefix: Cidr,
    pub tags: BTreeSet<ObjectId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    pub prefix: Cidr,
    /// Regional Internet Registry slug required by the store when creating an aggregate.
    pub rir: String,
    pub description: String,
    pub tags: BTreeSet<ObjectId>,
}

/// Label matched onto subscriptions by display-name substring.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    pub tags: BTreeSet<ObjectId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub slug: String,
    pub tags: BTreeSet<ObjectId>,
}

/// Routing-domain record (VRF).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vrf {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VrfSpec {
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<ObjectId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrefixStatus {
    #[default]
    Active,
    Container,
    Reserved,
    Deprecated,
}

impl fmt::Display for PrefixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrefixStatus::Active => "active",
            PrefixStatus::Container => "container",
            PrefixStatus::Reserved => "reserved",
            PrefixStatus::Deprecated => "deprecated",
        };
        write!(f, "{s}")
    }
}

/// Attributes this tool owns on a prefix, stored as custom fields in NetBox.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixAttributes {
    /// Subscription the address space belongs to (display name only).
    pub subscription: Option<String>,
    pub subscription_url: Option<String>,
    /// Free-text utilization summary.
    pub summary: Option<String>,
    pub ips_used: Option<i64>,
    pub ips_available: Option<i64>,
    /// CIDR of the aggregate the prefix was matched under.
    pub parent_aggregate: Option<String>,
}

/// A prefix record as currently held by the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub id: ObjectId,
    pub prefix: Cidr,
    /// VRF name, `None` for the global table.
    pub vrf: Option<String>,
    pub status: PrefixStatus,
    pub description: String,
    pub role: Option<ObjectId>,
    pub tags: BTreeSet<ObjectId>,
    pub attributes: PrefixAttributes,
}

impl Prefix {
    /// Name of the routing table the prefix lives in, for logs.
    pub fn scope(&self) -> &str {
        self.vrf.as_deref().unwrap_or("global")
    }
}

/// A prefix to create. Always placed in the global table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewPrefix {
    pub prefix: Cidr,
    pub status: PrefixStatus,
    pub description: String,
    pub role: Option<ObjectId>,
    pub tags: BTreeSet<ObjectId>,
    pub attributes: PrefixAttributes,
}

/// Partial update of a prefix. `None` leaves a field untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixPatch {
    pub description: Option<String>,
    pub role: Option<ObjectId>,
    /// Complete replacement tag set.
    pub tags: Option<BTreeSet<ObjectId>>,
    pub attributes: PrefixAttributes,
}

impl PrefixPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.role.is_none()
            && self.tags.is_none()
            && self.attributes == PrefixAttributes::default()
    }

    /// Names of the fields this patch touches, for logs.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let a = &self.attributes;
        [
            ("description", self.description.is_some()),
            ("role", self.role.is_some()),
            ("tags", self.tags.is_some()),
            ("subscription", a.subscription.is_some()),
            ("subscription_url", a.subscription_url.is_some()),
            ("summary", a.summary.is_some()),
            ("ips_used", a.ips_used.is_some()),
            ("ips_available", a.ips_available.is_some()),
            ("parent_aggregate", a.parent_aggregate.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Apply this patch to a prefix in place.
    pub fn apply_to(&self, prefix: &mut Prefix) {
        if let Some(description) = &self.description {
            prefix.description = description.clone();
        }
        if let Some(role) = self.role {
            prefix.role = Some(role);
        }
        if let Some(tags) = &self.tags {
            prefix.tags = tags.clone();
        }
        let a = &self.attributes;
        let p = &mut prefix.attributes;
        if a.subscription.is_some() {
            p.subscription = a.subscription.clone();
        }
        if a.subscription_url.is_some() {
            p.subscription_url = a.subscription_url.clone();
        }
        if a.summary.is_some() {
            p.summary = a.summary.clone();
        }
        if a.ips_used.is_some() {
            p.ips_used = a.ips_used;
        }
        if a.ips_available.is_some() {
            p.ips_available = a.ips_available;
        }
        if a.parent_aggregate.is_some() {
            p.parent_aggregate = a.parent_aggregate.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_spec_from_slug() {
        let spec = TagSpec::from_slug("network");
        assert_eq!(spec.name, "Network");
        assert_eq!(spec.slug, "network");
    }

    #[test]
    fn test_patch_empty_and_fields() {
        let mut patch = PrefixPatch::default();
        assert!(patch.is_empty());
        assert!(patch.changed_fields().is_empty());
        patch.attributes.summary = Some("x".to_string());
        patch.tags = Some(BTreeSet::from([1, 2]));
        assert!(!patch.is_empty());
        assert_eq!(patch.changed_fields(), vec!["tags", "summary"]);
    }

    #[test]
    fn test_patch_apply_keeps_untouched_fields() {
        let mut prefix = Prefix {
            id: 7,
            prefix: Cidr::new("10.0.0.0/16").unwrap(),
            vrf: None,
            status: PrefixStatus::Active,
            description: "hand written".to_string(),
            role: None,
            tags: BTreeSet::from([3]),
            attributes: PrefixAttributes {
                subscription_url: Some("https://example".to_string()),
                ..Default::default()
            },
        };
        let patch = PrefixPatch {
            tags: Some(BTreeSet::from([3, 4])),
            attributes: PrefixAttributes {
                ips_used: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };
        patch.apply_to(&mut prefix);
        assert_eq!(prefix.description, "hand written");
        assert_eq!(prefix.tags, BTreeSet::from([3, 4]));
        assert_eq!(prefix.attributes.ips_used, Some(10));
        assert_eq!(prefix.attributes.subscription_url.as_deref(), Some("https://example"));
        assert_eq!(prefix.scope(), "global");
    }
}
