// cargo watch -x 'fmt' -x 'run'

pub mod azure;
pub mod config;
pub mod models;
pub mod netbox;
pub mod output;
pub mod processing;
pub mod reconcile;

use azure::{collect_snapshot, discover_scopes, AzCliSource, CollectorSettings, TopologySource};
use colored::Colorize;
use config::RunSettings;
use models::UtilizationRecord;
use netbox::NetBoxClient;
use processing::{find_shared_address_spaces, log_shared_address_spaces};
use reconcile::{InventoryStore, MemoryStore, ReconcileSettings, Reconciler, RunSummary};
use std::error::Error;

/// Scan the configured subscriptions and compute the utilization snapshot.
pub async fn scan<S: TopologySource + ?Sized>(
    source: &S,
    settings: &RunSettings,
) -> Result<Vec<UtilizationRecord>, Box<dyn Error>> {
    let collector = CollectorSettings::from_run(settings);
    let scopes = discover_scopes(source, &settings.subscriptions, &collector)
        .await
        .map_err(|e| format!("Subscription discovery failed: {e}"))?;
    let records = collect_snapshot(source, scopes, &settings.filter, &collector).await;
    log::info!("Snapshot holds {} address space record(s)", records.len());
    Ok(records)
}

/// The inventory to reconcile into: NetBox, or an empty in-memory inventory for a
/// dry run without NetBox credentials.
pub async fn open_store(settings: &RunSettings) -> Result<Box<dyn InventoryStore>, Box<dyn Error>> {
    let dry_run = settings.reconcile.dry_run;
    if dry_run && (settings.netbox.url.is_empty() || settings.netbox.token.is_empty()) {
        log::warn!("Dry run without NetBox credentials, planning against an empty inventory");
        return Ok(Box::new(MemoryStore::new()));
    }
    let client = NetBoxClient::new(&settings.netbox, dry_run)?;
    client
        .status()
        .await
        .map_err(|e| format!("NetBox not reachable at {}: {e}", settings.netbox.url))?;
    Ok(Box::new(client))
}

/// Prepare the inventory and reconcile every record into it.
pub async fn reconcile_records<S: InventoryStore + ?Sized>(
    store: &S,
    settings: &RunSettings,
    records: &[UtilizationRecord],
) -> Result<RunSummary, Box<dyn Error>> {
    let reconciler = Reconciler::prepare(store, &ReconcileSettings::from_run(settings)).await?;
    let vrfs = reconciler.ensure_routing_domains(records).await;
    if vrfs > 0 {
        log::info!("{vrfs} routing domain(s) ensured");
    }
    Ok(reconciler.reconcile(records).await)
}

/// One full run: scan Azure, report, reconcile into the inventory.
pub async fn run(settings: RunSettings) -> Result<RunSummary, Box<dyn Error>> {
    let started = chrono::Local::now();
    let dry_run = settings.reconcile.dry_run;
    log::info!(
        "#Start run() at {}{}",
        started.format("%Y-%m-%d %H:%M:%S"),
        if dry_run { " [DRY RUN]".on_blue().to_string() } else { String::new() }
    );

    // fail on an unreachable inventory before spending time on the scan
    let store = open_store(&settings).await?;

    let records = scan(&AzCliSource::new(), &settings).await?;
    output::print_records(&records)?;
    output::print_overview(&records, &settings.thresholds);
    log_shared_address_spaces(&find_shared_address_spaces(&records));

    let summary = reconcile_records(store.as_ref(), &settings, &records).await?;
    output::print_summary(&summary, chrono::Local::now() - started, dry_run);
    Ok(summary)
}
