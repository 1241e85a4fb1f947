//! In-memory [`InventoryStore`].
//!
//! Used for dry runs without NetBox credentials and by tests. It can simulate another
//! writer creating a prefix between our lookup and our create, and a store that stops
//! answering for one CIDR.

use super::store::{CustomFieldSpec, InventoryStore, StoreError, StoreResult};
use crate::models::inventory::{
    Aggregate, AggregateSpec, NewPrefix, ObjectId, Prefix, PrefixAttributes, PrefixPatch,
    PrefixStatus, Role, RoleSpec, Tag, TagSpec, Vrf, VrfSpec,
};
use crate::models::Cidr;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    next_id: ObjectId,
    prefixes: Vec<Prefix>,
    tags: Vec<Tag>,
    custom_fields: BTreeSet<String>,
    aggregates: Vec<Aggregate>,
    roles: Vec<Role>,
    vrfs: Vec<Vrf>,
    writes: usize,
    race_next_create: bool,
    unavailable: HashSet<Cidr>,
}

impl Inner {
    fn next_id(&mut self) -> ObjectId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a prefix as if another tool had created it. Returns its id.
    pub fn insert_prefix(&self, prefix: Cidr, vrf: Option<&str>, description: &str) -> ObjectId {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.prefixes.push(Prefix {
            id,
            prefix,
            vrf: vrf.map(str::to_string),
            status: PrefixStatus::Active,
            description: description.to_string(),
            role: None,
            tags: BTreeSet::new(),
            attributes: PrefixAttributes::default(),
        });
        id
    }

    /// Replace a stored prefix wholesale.
    pub fn put_prefix(&self, prefix: Prefix) {
        let mut inner = self.lock();
        match inner.prefixes.iter_mut().find(|p| p.id == prefix.id) {
            Some(existing) => *existing = prefix,
            None => inner.prefixes.push(prefix),
        }
    }

    pub fn prefixes(&self) -> Vec<Prefix> {
        self.lock().prefixes.clone()
    }

    pub fn prefix(&self, id: ObjectId) -> Option<Prefix> {
        self.lock().prefixes.iter().find(|p| p.id == id).cloned()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    pub fn tag_id(&self, slug: &str) -> Option<ObjectId> {
        self.lock().tags.iter().find(|t| t.slug == slug).map(|t| t.id)
    }

    pub fn vrfs(&self) -> Vec<Vrf> {
        self.lock().vrfs.clone()
    }

    pub fn custom_fields(&self) -> Vec<String> {
        self.lock().custom_fields.iter().cloned().collect()
    }

    /// Number of create/update calls on prefixes so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Make the next prefix creation lose a race: another writer creates the same CIDR
    /// first and our create gets a conflict.
    pub fn race_next_create(&self) {
        self.lock().race_next_create = true;
    }

    /// Make lookups of one CIDR fail with a timeout.
    pub fn set_unavailable(&self, prefix: Cidr) {
        self.lock().unavailable.insert(prefix);
    }
}

fn add_missing(existing: &mut BTreeSet<ObjectId>, wanted: &BTreeSet<ObjectId>) {
    existing.extend(wanted.iter().copied());
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn find_prefixes(&self, prefix: &Cidr) -> StoreResult<Vec<Prefix>> {
        let inner = self.lock();
        if inner.unavailable.contains(prefix) {
            return Err(StoreError::Timeout(format!("lookup of {prefix}")));
        }
        Ok(inner
            .prefixes
            .iter()
            .filter(|p| p.prefix == *prefix)
            .cloned()
            .collect())
    }

    async fn create_prefix(&self, new: &NewPrefix) -> StoreResult<Prefix> {
        let mut inner = self.lock();
        if inner.race_next_create {
            inner.race_next_create = false;
            let id = inner.next_id();
            inner.prefixes.push(Prefix {
                id,
                prefix: new.prefix,
                vrf: None,
                status: PrefixStatus::Active,
                description: "created by another writer".to_string(),
                role: None,
                tags: BTreeSet::new(),
                attributes: PrefixAttributes::default(),
            });
        }
        if inner
            .prefixes
            .iter()
            .any(|p| p.prefix == new.prefix && p.vrf.is_none())
        {
            return Err(StoreError::Conflict(format!("Duplicate prefix found: {}", new.prefix)));
        }
        inner.writes += 1;
        let id = inner.next_id();
        let prefix = Prefix {
            id,
            prefix: new.prefix,
            vrf: None,
            status: new.status,
            description: new.description.clone(),
            role: new.role,
            tags: new.tags.clone(),
            attributes: new.attributes.clone(),
        };
        inner.prefixes.push(prefix.clone());
        Ok(prefix)
    }

    async fn update_prefix(&self, id: ObjectId, patch: &PrefixPatch) -> StoreResult<Prefix> {
        let mut inner = self.lock();
        inner.writes += 1;
        let prefix = inner
            .prefixes
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::Api {
                status: 404,
                body: format!("prefix {id} not found"),
            })?;
        patch.apply_to(prefix);
        Ok(prefix.clone())
    }

    async fn ensure_tag(&self, spec: &TagSpec) -> StoreResult<Tag> {
        let mut inner = self.lock();
        if let Some(tag) = inner.tags.iter().find(|t| t.slug == spec.slug) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: inner.next_id(),
            name: spec.name.clone(),
            slug: spec.slug.clone(),
        };
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    async fn ensure_custom_field(&self, spec: &CustomFieldSpec) -> StoreResult<()> {
        self.lock().custom_fields.insert(spec.name.to_string());
        Ok(())
    }

    async fn ensure_aggregate(&self, spec: &AggregateSpec) -> StoreResult<Aggregate> {
        let mut inner = self.lock();
        if let Some(agg) = inner.aggregates.iter_mut().find(|a| a.prefix == spec.prefix) {
            add_missing(&mut agg.tags, &spec.tags);
            return Ok(agg.clone());
        }
        let agg = Aggregate {
            id: inner.next_id(),
            prefix: spec.prefix,
            tags: spec.tags.clone(),
        };
        inner.aggregates.push(agg.clone());
        Ok(agg)
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> StoreResult<Role> {
        let mut inner = self.lock();
        if let Some(role) = inner.roles.iter_mut().find(|r| r.slug == spec.slug) {
            add_missing(&mut role.tags, &spec.tags);
            return Ok(role.clone());
        }
        let role = Role {
            id: inner.next_id(),
            name: spec.name.clone(),
            slug: spec.slug.clone(),
            tags: spec.tags.clone(),
        };
        inner.roles.push(role.clone());
        Ok(role)
    }

    async fn ensure_vrf(&self, spec: &VrfSpec) -> StoreResult<Vrf> {
        let mut inner = self.lock();
        if let Some(vrf) = inner.vrfs.iter().find(|v| v.name == spec.name) {
            return Ok(vrf.clone());
        }
        let vrf = Vrf {
            id: inner.next_id(),
            name: spec.name.clone(),
        };
        inner.vrfs.push(vrf.clone());
        Ok(vrf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        Cidr::new(s).unwrap()
    }

    fn new_prefix(s: &str) -> NewPrefix {
        NewPrefix {
            prefix: cidr(s),
            status: PrefixStatus::Container,
            description: "x".to_string(),
            role: None,
            tags: BTreeSet::new(),
            attributes: PrefixAttributes::default(),
        }
    }

    #[tokio::test]
    async fn test_create_conflicts_in_global_table() {
        let store = MemoryStore::new();
        store.insert_prefix(cidr("10.0.0.0/16"), Some("blue"), "other vrf");
        store.create_prefix(&new_prefix("10.0.0.0/16")).await.unwrap();
        let err = store.create_prefix(&new_prefix("10.0.0.0/16")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.find_prefixes(&cidr("10.0.0.0/16")).await.unwrap().len(), 2);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_race_next_create() {
        let store = MemoryStore::new();
        store.race_next_create();
        let err = store.create_prefix(&new_prefix("10.9.0.0/16")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let found = store.find_prefixes(&cidr("10.9.0.0/16")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "created by another writer");
    }

    #[tokio::test]
    async fn test_ensure_is_get_or_create() {
        let store = MemoryStore::new();
        let a = store.ensure_tag(&TagSpec::from_slug("azure")).await.unwrap();
        let b = store.ensure_tag(&TagSpec::from_slug("azure")).await.unwrap();
        assert_eq!(a, b);

        let spec = RoleSpec {
            name: "PRD".to_string(),
            slug: "prd".to_string(),
            tags: BTreeSet::from([a.id]),
        };
        store.ensure_role(&spec).await.unwrap();
        let extra = store.ensure_tag(&TagSpec::from_slug("prod")).await.unwrap();
        let role = store
            .ensure_role(&RoleSpec {
                tags: BTreeSet::from([extra.id]),
                ..spec
            })
            .await
            .unwrap();
        assert_eq!(role.tags, BTreeSet::from([a.id, extra.id]));
    }

    #[tokio::test]
    async fn test_unavailable_lookup() {
        let store = MemoryStore::new();
        store.set_unavailable(cidr("10.0.0.0/8"));
        assert!(matches!(
            store.find_prefixes(&cidr("10.0.0.0/8")).await,
            Err(StoreError::Timeout(_))
        ));
    }
}
