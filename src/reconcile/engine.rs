//! Reconciliation of utilization records into the inventory-of-record.
//!
//! Per record: resolve the aggregate and role, look the CIDR up, then either create a
//! container prefix or diff every matching prefix against the desired state. Tags are
//! only ever added. The summary and the two counters are rewritten on every pass.
//! A failure on one record is logged and counted; the run goes on.

use super::migration::migrate_subscription_value;
use super::resolve::{match_aggregate, match_role, ResolvedRole};
use super::store::{InventoryStore, StoreError, StoreResult, PREFIX_FIELDS};
use super::summary::RunSummary;
use crate::config::{AggregateSetting, ReconcileConfig, RoleSetting, RunSettings};
use crate::models::inventory::{
    Aggregate, AggregateSpec, NewPrefix, ObjectId, Prefix, PrefixAttributes, PrefixPatch,
    PrefixStatus, RoleSpec, Tag, TagSpec, VrfSpec,
};
use crate::models::UtilizationRecord;
use crate::processing::{slugify, summary_line, unique_short_name, Thresholds, Utilization};
use colored::Colorize;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

/// Description of prefixes created by the sync.
pub const CREATED_DESCRIPTION: &str =
    "⚠️ Created from Azure scan, not documented yet: please review";

/// Longest generated VRF name.
pub const VRF_NAME_MAX: usize = 64;

/// Portal link stored on every prefix.
pub fn subscription_url(subscription_id: &str) -> String {
    format!("https://portal.azure.com/#@/subscription/{subscription_id}/overview")
}

/// Name of the per-subscription VRF. Unique even when display names collide.
pub fn vrf_name(display_name: &str, subscription_id: &str) -> String {
    unique_short_name(display_name, subscription_id, VRF_NAME_MAX)
}

fn clamp_i64(n: u128) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Reconciler inputs taken from the run settings.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub options: ReconcileConfig,
    pub thresholds: Thresholds,
    pub sync_tag: TagSpec,
    pub additional_tags: Vec<String>,
    pub aggregates: Vec<AggregateSetting>,
    pub roles: Vec<RoleSetting>,
}

impl ReconcileSettings {
    pub fn from_run(settings: &RunSettings) -> ReconcileSettings {
        ReconcileSettings {
            options: settings.reconcile,
            thresholds: settings.thresholds,
            sync_tag: settings.sync_tag.clone(),
            additional_tags: settings.additional_tags.clone(),
            aggregates: settings.aggregates.clone(),
            roles: settings.roles.clone(),
        }
    }
}

/// What a prefix should look like after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub tags: BTreeSet<ObjectId>,
    pub role: Option<ObjectId>,
    pub parent_aggregate: Option<String>,
    /// Used only when the current description is empty.
    pub description: String,
    pub subscription: String,
    pub subscription_url: String,
    pub summary: String,
    pub ips_used: i64,
    pub ips_available: i64,
}

/// Diff one existing prefix against the desired state.
///
/// Description and subscription are only filled when empty; role, parent aggregate and
/// portal link are corrected when they differ; tags become the union of both sets.
/// Summary and counters are always written.
pub fn plan_update(current: &Prefix, desired: &DesiredState) -> PrefixPatch {
    let mut patch = PrefixPatch::default();

    if current.description.trim().is_empty() {
        patch.description = Some(desired.description.clone());
    }
    if desired.role.is_some() && current.role != desired.role {
        patch.role = desired.role;
    }
    let merged: BTreeSet<ObjectId> = current.tags.union(&desired.tags).copied().collect();
    if merged != current.tags {
        patch.tags = Some(merged);
    }

    let attrs = &current.attributes;
    if attrs.subscription.as_deref().map_or(true, |s| s.trim().is_empty()) {
        patch.attributes.subscription = Some(desired.subscription.clone());
    }
    if attrs.subscription_url.as_deref() != Some(desired.subscription_url.as_str()) {
        patch.attributes.subscription_url = Some(desired.subscription_url.clone());
    }
    if let Some(parent) = &desired.parent_aggregate {
        if attrs.parent_aggregate.as_ref() != Some(parent) {
            patch.attributes.parent_aggregate = Some(parent.clone());
        }
    }

    patch.attributes.summary = Some(desired.summary.clone());
    patch.attributes.ips_used = Some(desired.ips_used);
    patch.attributes.ips_available = Some(desired.ips_available);
    patch
}

/// Legacy subscription migration: replaces a `"<name> - <guid>"` value with the display
/// name, even though the regular diff never overwrites a filled subscription.
pub fn apply_legacy_migration(current: &Prefix, desired: &DesiredState, patch: &mut PrefixPatch) {
    if let Some(clean) =
        migrate_subscription_value(current.attributes.subscription.as_deref(), &desired.subscription)
    {
        log::info!(
            "{} (vrf={}): legacy subscription value {:?} rewritten to {:?}",
            current.prefix,
            current.scope(),
            current.attributes.subscription.as_deref().unwrap_or_default(),
            clean
        );
        patch.attributes.subscription = Some(clean);
    }
}

/// Store objects resolved once per run.
#[derive(Debug)]
struct Catalog {
    sync_tag: Tag,
    extra_tags: BTreeSet<ObjectId>,
    aggregates: Vec<Aggregate>,
    roles: Vec<ResolvedRole>,
    /// Region tag per region slug, `None` when it could not be ensured.
    region_tags: Mutex<HashMap<String, Option<ObjectId>>>,
}

/// Tag grouping prefixes by Azure region, e.g. `Westeurope` / `westeurope`.
pub fn region_tag_spec(region: &str) -> Option<TagSpec> {
    let slug = slugify(region);
    if slug.is_empty() {
        return None;
    }
    let mut spec = TagSpec::from_slug(&slug);
    spec.description = format!("Azure region: {region}");
    Some(spec)
}

async fn ensure_tag_ids<S: InventoryStore + ?Sized>(store: &S, slugs: &[String]) -> BTreeSet<ObjectId> {
    let mut ids = BTreeSet::new();
    for slug in slugs {
        match store.ensure_tag(&TagSpec::from_slug(slug)).await {
            Ok(tag) => {
                ids.insert(tag.id);
            }
            Err(e) => log::warn!("Tag '{slug}' unavailable, not applied: {e}"),
        }
    }
    ids
}

pub struct Reconciler<'a, S: InventoryStore + ?Sized> {
    store: &'a S,
    options: ReconcileConfig,
    thresholds: Thresholds,
    catalog: Catalog,
}

impl<'a, S: InventoryStore + ?Sized> Reconciler<'a, S> {
    /// Ensure custom fields, tags, aggregates and roles exist.
    ///
    /// Fails when the custom fields or the sync tag cannot be ensured: no prefix is
    /// written in that case. An extra tag, aggregate or role that cannot be ensured is
    /// left out with a warning.
    pub async fn prepare(store: &'a S, settings: &ReconcileSettings) -> StoreResult<Reconciler<'a, S>> {
        for field in PREFIX_FIELDS.iter() {
            store.ensure_custom_field(field).await?;
        }
        let sync_tag = store.ensure_tag(&settings.sync_tag).await?;
        log::info!("Sync tag {} (id={})", sync_tag.slug.on_blue(), sync_tag.id);

        let extra_tags = ensure_tag_ids(store, &settings.additional_tags).await;

        let mut aggregates = Vec::with_capacity(settings.aggregates.len());
        for agg in &settings.aggregates {
            let spec = AggregateSpec {
                prefix: agg.prefix,
                rir: agg.rir.clone(),
                description: agg.description.clone(),
                tags: ensure_tag_ids(store, &agg.tags).await,
            };
            match store.ensure_aggregate(&spec).await {
                Ok(aggregate) => aggregates.push(aggregate),
                Err(e) => log::warn!("Aggregate {} unavailable, not matched: {e}", agg.prefix),
            }
        }

        let mut roles = Vec::with_capacity(settings.roles.len());
        for role in &settings.roles {
            let spec = RoleSpec {
                name: role.name.clone(),
                slug: role.slug.clone(),
                tags: ensure_tag_ids(store, &role.tags).await,
            };
            match store.ensure_role(&spec).await {
                Ok(resolved) => roles.push(ResolvedRole {
                    match_on: role.match_on.clone(),
                    role: resolved,
                }),
                Err(e) => log::warn!("Role '{}' unavailable, not matched: {e}", role.name),
            }
        }

        log::info!(
            "Reconciler ready: {} extra tags, {} aggregates, {} roles",
            extra_tags.len(),
            aggregates.len(),
            roles.len()
        );
        Ok(Reconciler {
            store,
            options: settings.options,
            thresholds: settings.thresholds,
            catalog: Catalog {
                sync_tag,
                extra_tags,
                aggregates,
                roles,
                region_tags: Mutex::new(HashMap::new()),
            },
        })
    }

    fn region_tags(&self) -> MutexGuard<'_, HashMap<String, Option<ObjectId>>> {
        self.catalog.region_tags.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ensure the tag of one Azure region, once per run. A failure is logged and
    /// remembered: prefixes of that region go without it.
    pub async fn ensure_region_tag(&self, region: &str) -> Option<ObjectId> {
        let spec = region_tag_spec(region)?;
        if let Some(cached) = self.region_tags().get(&spec.slug) {
            return *cached;
        }
        let id = match self.store.ensure_tag(&spec).await {
            Ok(tag) => {
                log::debug!("Region tag {} (id={})", tag.slug, tag.id);
                Some(tag.id)
            }
            Err(e) => {
                log::warn!("Region tag '{}' unavailable, not applied: {e}", spec.slug);
                None
            }
        };
        self.region_tags().insert(spec.slug, id);
        id
    }

    /// Desired state of the prefixes matching one record.
    pub fn desired_state(&self, record: &UtilizationRecord) -> DesiredState {
        let mut tags = BTreeSet::from([self.catalog.sync_tag.id]);
        tags.extend(&self.catalog.extra_tags);
        if let Some(Some(id)) = self.region_tags().get(&slugify(&record.region)) {
            tags.insert(*id);
        }

        let aggregate = match_aggregate(&self.catalog.aggregates, &record.address_space);
        if let Some(agg) = aggregate {
            tags.extend(&agg.tags);
        }
        let role = match_role(&self.catalog.roles, &record.subscription_name);
        if let Some(role) = role {
            tags.extend(&role.role.tags);
        }

        let utilization = Utilization {
            subnet_count: record.subnet_count,
            used: record.used,
            available: record.available,
        };
        DesiredState {
            tags,
            role: role.map(|r| r.role.id),
            parent_aggregate: aggregate.map(|a| a.prefix.to_string()),
            description: format!("Azure VNet: {} ({})", record.vnet_name, record.subscription_name),
            subscription: record.subscription_name.clone(),
            subscription_url: subscription_url(&record.subscription_id),
            summary: summary_line(&record.address_space, &utilization, &self.thresholds),
            ips_used: clamp_i64(u128::from(record.used)),
            ips_available: clamp_i64(record.available),
        }
    }

    /// Ensure one VRF per scanned subscription when routing domains are enabled.
    /// Returns the number of VRFs ensured.
    pub async fn ensure_routing_domains(&self, records: &[UtilizationRecord]) -> usize {
        if !self.options.routing_domains {
            return 0;
        }
        let subscriptions: BTreeMap<&str, &str> = records
            .iter()
            .map(|r| (r.subscription_id.as_str(), r.subscription_name.as_str()))
            .collect();

        let mut ensured = 0;
        for (id, name) in subscriptions {
            let spec = VrfSpec {
                name: vrf_name(name, id),
                description: format!("Azure subscription {name} ({id})"),
                tags: BTreeSet::from([self.catalog.sync_tag.id]),
            };
            match self.store.ensure_vrf(&spec).await {
                Ok(vrf) => {
                    log::debug!("VRF {} (id={}) for subscription {name}", vrf.name, vrf.id);
                    ensured += 1;
                }
                Err(e) => log::warn!("VRF {} for subscription {name} failed: {e}", spec.name),
            }
        }
        ensured
    }

    /// Reconcile every record, one at a time.
    pub async fn reconcile(&self, records: &[UtilizationRecord]) -> RunSummary {
        let mut summary = RunSummary::default();
        for (i, record) in records.iter().enumerate() {
            log::debug!(
                "[{}/{}] {} {} / {}",
                i + 1,
                records.len(),
                record.address_space,
                record.subscription_name,
                record.vnet_name
            );
            summary.merge(self.reconcile_record(record).await);
        }
        log::info!("Reconciliation done: {summary}");
        summary
    }

    async fn reconcile_record(&self, record: &UtilizationRecord) -> RunSummary {
        let mut outcome = RunSummary::default();
        let cidr = &record.address_space;
        self.ensure_region_tag(&record.region).await;
        let desired = self.desired_state(record);

        let matches = match self.store.find_prefixes(cidr).await {
            Ok(matches) => matches,
            Err(e) => {
                log::warn!("[ERR] lookup of {cidr} failed, record skipped: {e}");
                outcome.failed += 1;
                return outcome;
            }
        };

        if matches.len() > 1 {
            outcome.ambiguous += 1;
            let scopes = matches.iter().map(|p| p.scope()).join(", ");
            if self.options.strict_unique {
                log::warn!(
                    "[SKIP] {cidr} matches {} prefixes (vrf: {scopes}), not updated in strict mode",
                    matches.len()
                );
                outcome.skipped += 1;
                return outcome;
            }
            log::warn!(
                "{cidr} matches {} prefixes (vrf: {scopes}), updating all of them",
                matches.len()
            );
        }

        if matches.is_empty() {
            if !self.options.create_missing {
                log::info!(
                    "[MISS] {cidr} ({} / {}) not in inventory",
                    record.subscription_name,
                    record.vnet_name
                );
                outcome.not_found += 1;
                return outcome;
            }
            self.create(record, &desired, &mut outcome).await;
            return outcome;
        }

        for prefix in &matches {
            self.update_existing(prefix, &desired, &mut outcome).await;
        }
        outcome
    }

    async fn update_existing(&self, current: &Prefix, desired: &DesiredState, outcome: &mut RunSummary) {
        let mut patch = plan_update(current, desired);
        apply_legacy_migration(current, desired, &mut patch);
        let fields = patch.changed_fields().join(", ");

        if self.options.dry_run {
            log::info!(
                "[DRY] {} (vrf={}) would update {fields}: {}",
                current.prefix,
                current.scope(),
                desired.summary
            );
            outcome.updated += 1;
            return;
        }

        match self.store.update_prefix(current.id, &patch).await {
            Ok(_) => {
                log::info!(
                    "[OK] {} (vrf={}) updated: {fields}",
                    current.prefix.to_string().on_blue(),
                    current.scope()
                );
                outcome.updated += 1;
            }
            Err(e) => {
                log::warn!("[ERR] update of {} (id={}) failed: {e}", current.prefix, current.id);
                outcome.failed += 1;
            }
        }
    }

    async fn create(&self, record: &UtilizationRecord, desired: &DesiredState, outcome: &mut RunSummary) {
        let cidr = &record.address_space;
        let new = NewPrefix {
            prefix: *cidr,
            status: PrefixStatus::Container,
            description: CREATED_DESCRIPTION.to_string(),
            role: desired.role,
            tags: desired.tags.clone(),
            attributes: PrefixAttributes {
                subscription: Some(desired.subscription.clone()),
                subscription_url: Some(desired.subscription_url.clone()),
                summary: Some(desired.summary.clone()),
                ips_used: Some(desired.ips_used),
                ips_available: Some(desired.ips_available),
                parent_aggregate: desired.parent_aggregate.clone(),
            },
        };

        if self.options.dry_run {
            log::info!("[DRY] {cidr} would be created as container: {}", desired.summary);
            outcome.created += 1;
            return;
        }

        match self.store.create_prefix(&new).await {
            Ok(prefix) => {
                log::info!(
                    "[NEW] {} created (id={}) for {} / {}",
                    cidr.to_string().on_blue(),
                    prefix.id,
                    record.subscription_name,
                    record.vnet_name
                );
                outcome.created += 1;
            }
            Err(StoreError::Conflict(msg)) => {
                log::warn!("{cidr} was created by another writer meanwhile ({msg}), updating it instead");
                match self.store.find_prefixes(cidr).await {
                    Ok(found) if !found.is_empty() => {
                        for prefix in &found {
                            self.update_existing(prefix, desired, outcome).await;
                        }
                    }
                    Ok(_) => {
                        log::warn!("[ERR] {cidr} reported as duplicate but not found on re-query");
                        outcome.failed += 1;
                    }
                    Err(e) => {
                        log::warn!("[ERR] re-query of {cidr} failed: {e}");
                        outcome.failed += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("[ERR] creation of {cidr} failed: {e}");
                outcome.failed += 1;
            }
        }
    }
}
