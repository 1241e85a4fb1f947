//! Address-space processing logic.
//!
//! This module contains the pure business logic, free of any I/O:
//! - [`containment`] - CIDR containment matching
//! - [`utilization`] - used/available accounting, headroom and tiers
//! - [`identifier`] - collision-free short names per subscription
//! - [`filters`] - region/resource-group/name filters
//! - [`overlap`] - address spaces declared by more than one network

pub mod containment;
pub mod filters;
pub mod identifier;
mod overlap;
pub mod utilization;

// Re-export public functions
pub use containment::{contains, first_match, Block};
pub use filters::{FilterConfig, NetworkFilter};
pub use identifier::{slugify, unique_short_name};
pub use overlap::{find_shared_address_spaces, log_shared_address_spaces, OverlapConflict};
pub use utilization::{
    compute_utilization, headroom_percent, summary_line, Thresholds, Tier, Utilization,
    UtilizationPolicy,
};
