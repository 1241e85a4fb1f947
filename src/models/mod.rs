//! Domain models for the Azure IP utilization sync.
//!
//! This module contains the core data structures used throughout the application:
//! - [`Cidr`] - IPv4/IPv6 block with Azure reservation rules
//! - [`Subnet`], [`SubnetUsage`] and [`SubnetUsageMap`] - subnet topology and usage
//! - [`VirtualNetwork`] - a network with its address spaces
//! - [`SubscriptionRef`] - uniform subscription shape
//! - [`UtilizationRecord`] - computed output row per address space
//! - [`inventory`] - records held by the inventory-of-record

mod cidr;
pub mod inventory;
mod record;
mod subnet;
mod subscription;
mod vnet;

// Re-export public types
pub use cidr::{Cidr, Family, RESERVED_IPV4, RESERVED_IPV6};
pub use record::{UtilizationRecord, RECORD_COLUMNS};
pub use subnet::{Subnet, SubnetUsage, SubnetUsageMap};
pub use subscription::{SubscriptionRef, SubscriptionScope};
pub use vnet::{resource_group_of, VirtualNetwork};
