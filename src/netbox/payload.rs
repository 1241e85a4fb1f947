//! NetBox REST payloads.
//!
//! Read side: records as returned by list/detail endpoints, converted into the
//! store-agnostic inventory model. Write side: JSON bodies for create and partial update.

use crate::models::inventory::{
    Aggregate, NewPrefix, ObjectId, Prefix, PrefixAttributes, PrefixPatch, PrefixStatus, Role,
    Tag, Vrf,
};
use crate::models::Cidr;
use crate::reconcile::store::{
    FIELD_IPS_AVAILABLE, FIELD_IPS_USED, FIELD_PARENT_AGGREGATE, FIELD_SUBSCRIPTION,
    FIELD_SUBSCRIPTION_URL, FIELD_SUMMARY,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// One page of a list endpoint.
#[derive(Deserialize, Debug)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    /// Absolute URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NestedRef {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TagRecord {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

impl From<TagRecord> for Tag {
    fn from(t: TagRecord) -> Self {
        Tag {
            id: t.id,
            name: t.name,
            slug: t.slug,
        }
    }
}

fn tag_ids(tags: &[TagRecord]) -> BTreeSet<ObjectId> {
    tags.iter().map(|t| t.id).collect()
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChoiceValue {
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PrefixRecord {
    pub id: ObjectId,
    pub prefix: String,
    #[serde(default)]
    pub vrf: Option<NestedRef>,
    #[serde(default)]
    pub status: Option<ChoiceValue>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn int_field(fields: &Map<String, Value>, name: &str) -> Option<i64> {
    fields.get(name).and_then(Value::as_i64)
}

fn parse_status(status: Option<ChoiceValue>) -> PrefixStatus {
    status
        .and_then(|s| serde_json::from_value(Value::String(s.value)).ok())
        .unwrap_or_default()
}

impl TryFrom<PrefixRecord> for Prefix {
    type Error = String;

    fn try_from(record: PrefixRecord) -> Result<Self, Self::Error> {
        let prefix = Cidr::new(&record.prefix)
            .map_err(|e| format!("prefix id={} has invalid CIDR: {e}", record.id))?;
        let fields = &record.custom_fields;
        let attributes = PrefixAttributes {
            subscription: text_field(fields, FIELD_SUBSCRIPTION),
            subscription_url: text_field(fields, FIELD_SUBSCRIPTION_URL),
            summary: text_field(fields, FIELD_SUMMARY),
            ips_used: int_field(fields, FIELD_IPS_USED),
            ips_available: int_field(fields, FIELD_IPS_AVAILABLE),
            parent_aggregate: text_field(fields, FIELD_PARENT_AGGREGATE),
        };
        Ok(Prefix {
            id: record.id,
            prefix,
            vrf: record.vrf.map(|v| v.name),
            status: parse_status(record.status),
            description: record.description,
            role: record.role.map(|r| r.id),
            tags: tag_ids(&record.tags),
            attributes,
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AggregateRecord {
    pub id: ObjectId,
    pub prefix: String,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

impl TryFrom<AggregateRecord> for Aggregate {
    type Error = String;

    fn try_from(record: AggregateRecord) -> Result<Self, Self::Error> {
        let prefix = Cidr::new(&record.prefix)
            .map_err(|e| format!("aggregate id={} has invalid CIDR: {e}", record.id))?;
        Ok(Aggregate {
            id: record.id,
            prefix,
            tags: tag_ids(&record.tags),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RoleRecord {
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

impl From<RoleRecord> for Role {
    fn from(record: RoleRecord) -> Self {
        Role {
            id: record.id,
            tags: tag_ids(&record.tags),
            name: record.name,
            slug: record.slug,
        }
    }
}

impl From<NestedRef> for Vrf {
    fn from(record: NestedRef) -> Self {
        Vrf {
            id: record.id,
            name: record.name,
        }
    }
}

/// Tag list in the nested form accepted by every NetBox version: `[{"id": 1}, ...]`.
pub fn tags_json(tags: &BTreeSet<ObjectId>) -> Value {
    Value::Array(tags.iter().map(|id| json!({ "id": id })).collect())
}

/// Custom fields for the attributes that are set; unset ones are left out.
pub fn custom_fields_json(attributes: &PrefixAttributes) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut put = |name: &str, value: Option<Value>| {
        if let Some(value) = value {
            fields.insert(name.to_string(), value);
        }
    };
    put(FIELD_SUBSCRIPTION, attributes.subscription.clone().map(Value::from));
    put(FIELD_SUBSCRIPTION_URL, attributes.subscription_url.clone().map(Value::from));
    put(FIELD_SUMMARY, attributes.summary.clone().map(Value::from));
    put(FIELD_IPS_USED, attributes.ips_used.map(Value::from));
    put(FIELD_IPS_AVAILABLE, attributes.ips_available.map(Value::from));
    put(FIELD_PARENT_AGGREGATE, attributes.parent_aggregate.clone().map(Value::from));
    fields
}

/// Body of `POST /api/ipam/prefixes/`. No VRF: new prefixes go to the global table.
pub fn new_prefix_body(new: &NewPrefix) -> Value {
    let mut body = json!({
        "prefix": new.prefix.to_string(),
        "status": new.status.to_string(),
        "description": new.description,
        "tags": tags_json(&new.tags),
        "custom_fields": custom_fields_json(&new.attributes),
    });
    if let Some(role) = new.role {
        body["role"] = json!(role);
    }
    body
}

/// Body of `PATCH /api/ipam/prefixes/<id>/`, only the touched fields.
pub fn patch_body(patch: &PrefixPatch) -> Value {
    let mut body = Map::new();
    if let Some(description) = &patch.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(role) = patch.role {
        body.insert("role".to_string(), json!(role));
    }
    if let Some(tags) = &patch.tags {
        body.insert("tags".to_string(), tags_json(tags));
    }
    let fields = custom_fields_json(&patch.attributes);
    if !fields.is_empty() {
        body.insert("custom_fields".to_string(), Value::Object(fields));
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX_PAGE: &str = r#"{
        "count": 2,
        "next": null,
        "previous": null,
        "results": [
            {
                "id": 11,
                "url": "https://netbox.example.net/api/ipam/prefixes/11/",
                "display": "10.2.0.0/24",
                "family": {"value": 4, "label": "IPv4"},
                "prefix": "10.2.0.0/24",
                "vrf": null,
                "status": {"value": "container", "label": "Container"},
                "role": {"id": 3, "name": "PRD", "slug": "prd"},
                "description": "Hub",
                "tags": [{"id": 1, "name": "azure-sync", "slug": "azure-sync"}, {"id": 9, "name": "x", "slug": "x"}],
                "custom_fields": {
                    "azure_subscription": "Production",
                    "ips_used": 10,
                    "ips_available": 236,
                    "list_available_ips": null,
                    "unrelated": "keep"
                }
            },
            {
                "id": 12,
                "prefix": "10.2.0.0/24",
                "vrf": {"id": 2, "name": "blue"},
                "status": {"value": "weird", "label": "?"},
                "tags": [],
                "custom_fields": {}
            }
        ]
    }"#;

    #[test]
    fn test_prefix_page_mapping() {
        let page: Page<PrefixRecord> = serde_json::from_str(PREFIX_PAGE).unwrap();
        assert_eq!(page.count, 2);
        let prefixes: Vec<Prefix> = page
            .results
            .into_iter()
            .map(|r| Prefix::try_from(r).unwrap())
            .collect();

        let hub = &prefixes[0];
        assert_eq!(hub.scope(), "global");
        assert_eq!(hub.status, PrefixStatus::Container);
        assert_eq!(hub.role, Some(3));
        assert_eq!(hub.tags, BTreeSet::from([1, 9]));
        assert_eq!(hub.attributes.subscription.as_deref(), Some("Production"));
        assert_eq!(hub.attributes.ips_available, Some(236));
        assert_eq!(hub.attributes.summary, None);

        assert_eq!(prefixes[1].scope(), "blue");
        assert_eq!(prefixes[1].status, PrefixStatus::Active);
        assert!(prefixes[1].description.is_empty());
    }

    #[test]
    fn test_patch_body_only_touched_fields() {
        let patch = PrefixPatch {
            tags: Some(BTreeSet::from([1, 4])),
            attributes: PrefixAttributes {
                summary: Some("🟢 ample".to_string()),
                ips_used: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        let body = patch_body(&patch);
        assert_eq!(
            body,
            json!({
                "tags": [{"id": 1}, {"id": 4}],
                "custom_fields": {"list_available_ips": "🟢 ample", "ips_used": 0}
            })
        );
        assert_eq!(patch_body(&PrefixPatch::default()), json!({}));
    }

    #[test]
    fn test_new_prefix_body() {
        let new = NewPrefix {
            prefix: Cidr::new("10.5.0.0/16").unwrap(),
            status: PrefixStatus::Container,
            description: "d".to_string(),
            role: None,
            tags: BTreeSet::from([1]),
            attributes: PrefixAttributes::default(),
        };
        let body = new_prefix_body(&new);
        assert_eq!(body["status"], "container");
        assert_eq!(body["prefix"], "10.5.0.0/16");
        assert!(body.get("role").is_none());
        assert!(body.get("vrf").is_none());
    }

    #[test]
    fn test_bad_prefix_is_an_error() {
        let record = AggregateRecord {
            id: 4,
            prefix: "nonsense".to_string(),
            tags: vec![],
        };
        assert!(Aggregate::try_from(record).unwrap_err().contains("id=4"));
    }
}
