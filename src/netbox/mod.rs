//! NetBox as the inventory-of-record.
//!
//! - [`client`] - [`NetBoxClient`], an [`crate::reconcile::InventoryStore`] over the REST API
//! - [`payload`] - wire types and their mapping onto the inventory model

pub mod client;
pub mod payload;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use client::NetBoxClient;

/// Configuration for the NetBox connection.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NetBoxConfig {
    /// Base URL, e.g. `https://netbox.example.net`.
    pub url: String,
    /// API token, sent as `Authorization: Token <token>`.
    pub token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub verify_tls: bool,
}

impl Default for NetBoxConfig {
    fn default() -> Self {
        NetBoxConfig {
            url: String::new(),
            token: String::new(),
            timeout_secs: 30,
            verify_tls: true,
        }
    }
}

impl fmt::Debug for NetBoxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetBoxConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = NetBoxConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.verify_tls);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = NetBoxConfig {
            token: "0123456789abcdef".to_string(),
            ..Default::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("0123456789abcdef"));
        assert!(shown.contains("***"));
    }
}
