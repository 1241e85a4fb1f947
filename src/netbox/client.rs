//! NetBox REST client implementing [`InventoryStore`].
//!
//! `ensure_*` calls look the object up by slug, name or prefix and create it when
//! missing. In dry-run mode the client still reads but never writes: a missing object
//! is reported and stood in for by a placeholder with id 0.

use super::payload::{
    new_prefix_body, patch_body, tags_json, AggregateRecord, NestedRef, Page, PrefixRecord,
    RoleRecord, TagRecord,
};
use super::NetBoxConfig;
use crate::models::inventory::{
    Aggregate, AggregateSpec, NewPrefix, ObjectId, Prefix, PrefixPatch, Role, RoleSpec, Tag,
    TagSpec, Vrf, VrfSpec,
};
use crate::models::Cidr;
use crate::reconcile::store::{CustomFieldSpec, InventoryStore, StoreError, StoreResult};
use async_trait::async_trait;
use colored::Colorize;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::time::Duration;

/// Page size for list endpoints.
const PAGE_LIMIT: u32 = 1000;

pub struct NetBoxClient {
    base_url: String,
    client: Client,
    dry_run: bool,
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(e.to_string())
    } else {
        StoreError::Transport(e.to_string())
    }
}

/// Deserialize a response body, reporting the failing JSON path.
fn decode<T: DeserializeOwned>(body: &str) -> StoreResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| StoreError::Decode(format!("path={} error={}", e.path(), e.inner())))
}

/// Map a non-success answer onto [`StoreError`]. NetBox rejects a second prefix with
/// the same CIDR with a 400 mentioning "Duplicate prefix".
fn status_error(status: StatusCode, body: String) -> StoreError {
    if status == StatusCode::BAD_REQUEST && body.contains("Duplicate prefix") {
        StoreError::Conflict(body)
    } else {
        StoreError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

impl NetBoxClient {
    pub fn new(config: &NetBoxConfig, dry_run: bool) -> Result<NetBoxClient, Box<dyn Error>> {
        log::info!("Connecting to NetBox at {}", config.url.on_blue());

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|e| format!("Invalid API token: {e}"))?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(NetBoxClient {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            dry_run,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            log::debug!("NetBox answered {status}: {body}");
            return Err(status_error(status, body));
        }
        log::trace!("NetBox answered {status}: {body}");
        decode(&body)
    }

    /// All objects of a list endpoint matching a filter, following `next` links.
    async fn list<T: DeserializeOwned>(&self, path: &str, filter: &[(&str, String)]) -> StoreResult<Vec<T>> {
        let mut results = Vec::new();
        let first = self
            .client
            .get(self.url(path))
            .query(filter)
            .query(&[("limit", PAGE_LIMIT)]);
        let mut page: Page<T> = self.send(first).await?;
        loop {
            results.append(&mut page.results);
            match page.next.take() {
                Some(next) => page = self.send(self.client.get(next)).await?,
                None => break,
            }
        }
        Ok(results)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> StoreResult<T> {
        log::debug!("POST {path} {body}");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> StoreResult<T> {
        log::debug!("PATCH {path} {body}");
        self.send(self.client.patch(self.url(path)).json(body)).await
    }

    /// Check the API answers with the configured token.
    pub async fn status(&self) -> StoreResult<()> {
        let _: Value = self.send(self.client.get(self.url("status/"))).await?;
        log::debug!("NetBox status check passed");
        Ok(())
    }

    /// Add the wanted tags an existing object lacks. Returns the resulting tag set.
    async fn add_missing_tags(
        &self,
        path: &str,
        id: ObjectId,
        current: BTreeSet<ObjectId>,
        wanted: &BTreeSet<ObjectId>,
    ) -> StoreResult<BTreeSet<ObjectId>> {
        if wanted.is_subset(&current) {
            return Ok(current);
        }
        let merged: BTreeSet<ObjectId> = current.union(wanted).copied().collect();
        if self.dry_run {
            log::info!("[DRY] would add tags to {path}{id}/");
            return Ok(merged);
        }
        let _: Value = self
            .patch(&format!("{path}{id}/"), &json!({ "tags": tags_json(&merged) }))
            .await?;
        Ok(merged)
    }

    async fn ensure_rir(&self, slug: &str) -> StoreResult<ObjectId> {
        let found: Vec<NestedRef> = self.list("ipam/rirs/", &[("slug", slug.to_string())]).await?;
        if let Some(rir) = found.into_iter().next() {
            return Ok(rir.id);
        }
        if self.dry_run {
            log::info!("[DRY] would create RIR {slug}");
            return Ok(0);
        }
        log::info!("Creating RIR {}", slug.on_blue());
        let created: NestedRef = self
            .post(
                "ipam/rirs/",
                &json!({ "name": slug.to_uppercase(), "slug": slug, "is_private": true }),
            )
            .await?;
        Ok(created.id)
    }
}

#[async_trait]
impl InventoryStore for NetBoxClient {
    async fn find_prefixes(&self, prefix: &Cidr) -> StoreResult<Vec<Prefix>> {
        let records: Vec<PrefixRecord> = self
            .list("ipam/prefixes/", &[("prefix", prefix.to_string())])
            .await?;
        records
            .into_iter()
            .map(|r| Prefix::try_from(r).map_err(StoreError::Decode))
            // NetBox normalises the filter, keep exact matches only
            .filter(|p| p.as_ref().map_or(true, |p| p.prefix == *prefix))
            .collect()
    }

    async fn create_prefix(&self, new: &NewPrefix) -> StoreResult<Prefix> {
        let record: PrefixRecord = self.post("ipam/prefixes/", &new_prefix_body(new)).await?;
        Prefix::try_from(record).map_err(StoreError::Decode)
    }

    async fn update_prefix(&self, id: ObjectId, patch: &PrefixPatch) -> StoreResult<Prefix> {
        let record: PrefixRecord = self
            .patch(&format!("ipam/prefixes/{id}/"), &patch_body(patch))
            .await?;
        Prefix::try_from(record).map_err(StoreError::Decode)
    }

    async fn ensure_tag(&self, spec: &TagSpec) -> StoreResult<Tag> {
        let found: Vec<TagRecord> = self.list("extras/tags/", &[("slug", spec.slug.clone())]).await?;
        if let Some(tag) = found.into_iter().next() {
            log::debug!("Found existing tag: {}", spec.slug);
            return Ok(tag.into());
        }
        if self.dry_run {
            log::info!("[DRY] would create tag {}", spec.slug);
            return Ok(Tag {
                id: 0,
                name: spec.name.clone(),
                slug: spec.slug.clone(),
            });
        }
        log::info!("Creating new tag: {}", spec.slug.on_blue());
        let body = json!({ "name": spec.name, "slug": spec.slug, "description": spec.description });
        let created: TagRecord = self.post("extras/tags/", &body).await?;
        Ok(created.into())
    }

    async fn ensure_custom_field(&self, spec: &CustomFieldSpec) -> StoreResult<()> {
        let found: Vec<NestedRef> = self
            .list("extras/custom-fields/", &[("name", spec.name.to_string())])
            .await?;
        if !found.is_empty() {
            log::debug!("Found existing custom field: {}", spec.name);
            return Ok(());
        }
        if self.dry_run {
            log::info!("[DRY] would create custom field {}", spec.name);
            return Ok(());
        }
        log::info!("Creating new custom field: {}", spec.name.on_blue());
        let body = json!({
            "name": spec.name,
            "label": spec.label(),
            "type": spec.kind.as_str(),
            "description": spec.description,
            "object_types": ["ipam.prefix"],
            "required": false,
        });
        let _: Value = self.post("extras/custom-fields/", &body).await?;
        Ok(())
    }

    async fn ensure_aggregate(&self, spec: &AggregateSpec) -> StoreResult<Aggregate> {
        let found: Vec<AggregateRecord> = self
            .list("ipam/aggregates/", &[("prefix", spec.prefix.to_string())])
            .await?;
        if let Some(record) = found.into_iter().next() {
            let mut aggregate = Aggregate::try_from(record).map_err(StoreError::Decode)?;
            aggregate.tags = self
                .add_missing_tags("ipam/aggregates/", aggregate.id, aggregate.tags, &spec.tags)
                .await?;
            return Ok(aggregate);
        }

        let rir = self.ensure_rir(&spec.rir).await?;
        if self.dry_run {
            log::info!("[DRY] would create aggregate {}", spec.prefix);
            return Ok(Aggregate {
                id: 0,
                prefix: spec.prefix,
                tags: spec.tags.clone(),
            });
        }
        log::info!("Creating aggregate {}", spec.prefix.to_string().on_blue());
        let body = json!({
            "prefix": spec.prefix.to_string(),
            "rir": rir,
            "description": spec.description,
            "tags": tags_json(&spec.tags),
        });
        let record: AggregateRecord = self.post("ipam/aggregates/", &body).await?;
        Aggregate::try_from(record).map_err(StoreError::Decode)
    }

    async fn ensure_role(&self, spec: &RoleSpec) -> StoreResult<Role> {
        let found: Vec<RoleRecord> = self.list("ipam/roles/", &[("slug", spec.slug.clone())]).await?;
        if let Some(record) = found.into_iter().next() {
            let mut role = Role::from(record);
            role.tags = self
                .add_missing_tags("ipam/roles/", role.id, role.tags, &spec.tags)
                .await?;
            return Ok(role);
        }
        if self.dry_run {
            log::info!("[DRY] would create role {}", spec.slug);
            return Ok(Role {
                id: 0,
                name: spec.name.clone(),
                slug: spec.slug.clone(),
                tags: spec.tags.clone(),
            });
        }
        log::info!("Creating role {}", spec.slug.on_blue());
        let body = json!({ "name": spec.name, "slug": spec.slug, "tags": tags_json(&spec.tags) });
        let record: RoleRecord = self.post("ipam/roles/", &body).await?;
        Ok(record.into())
    }

    async fn ensure_vrf(&self, spec: &VrfSpec) -> StoreResult<Vrf> {
        let found: Vec<NestedRef> = self.list("ipam/vrfs/", &[("name", spec.name.clone())]).await?;
        if let Some(vrf) = found.into_iter().next() {
            return Ok(vrf.into());
        }
        if self.dry_run {
            log::info!("[DRY] would create VRF {}", spec.name);
            return Ok(Vrf {
                id: 0,
                name: spec.name.clone(),
            });
        }
        log::info!("Creating VRF {}", spec.name.on_blue());
        let body = json!({
            "name": spec.name,
            "description": spec.description,
            "tags": tags_json(&spec.tags),
        });
        let record: NestedRef = self.post("ipam/vrfs/", &body).await?;
        Ok(record.into())
    }
}
