//! Reconciliation of computed utilization into the inventory-of-record.
//!
//! - [`store`] - the [`InventoryStore`] seam and its error type
//! - [`memory`] - in-memory store for dry runs and tests
//! - [`resolve`] - aggregate and role matching
//! - [`migration`] - legacy subscription value rewrite
//! - [`engine`] - the [`Reconciler`]
//! - [`summary`] - run counters

pub mod engine;
mod memory;
pub mod migration;
pub mod resolve;
pub mod store;
mod summary;

pub use engine::{plan_update, DesiredState, ReconcileSettings, Reconciler, CREATED_DESCRIPTION};
pub use memory::MemoryStore;
pub use store::{CustomFieldKind, CustomFieldSpec, InventoryStore, StoreError, StoreResult, PREFIX_FIELDS};
pub use summary::RunSummary;
