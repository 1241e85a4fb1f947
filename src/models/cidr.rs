//! CIDR block utilities for IPv4 and IPv6.
//!
//! Provides [`Cidr`], a normalised network block used for address spaces, subnets,
//! aggregates and inventory prefixes, along with the Azure reservation rules.

use ipnet::IpNet;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt;
use std::net::IpAddr;

/// Azure reserves 5 addresses in every IPv4 subnet (network, gateway, 2x DNS, broadcast).
pub const RESERVED_IPV4: u128 = 5;
/// Azure reserves 2 addresses in every IPv6 subnet.
pub const RESERVED_IPV6: u128 = 2;

/// IP address family of a [`Cidr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => write!(f, "IPv4"),
            Family::V6 => write!(f, "IPv6"),
        }
    }
}

/// Network block in CIDR notation, stored with host bits cleared.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Cidr {
    net: IpNet,
}

impl Cidr {
    /// Parse a CIDR string (e.g. "10.0.0.0/24" or "fd00::/64").
    ///
    /// A bare address without a prefix length is rejected, and host bits are cleared:
    /// ```
    /// use azure_ip_sync::models::Cidr;
    /// assert_eq!(Cidr::new(" 10.1.2.3/16 ").unwrap().to_string(), "10.1.0.0/16");
    /// assert!(Cidr::new("10.1.2.3").is_err());
    /// ```
    pub fn new(cidr: &str) -> Result<Cidr, Box<dyn Error>> {
        let cidr = cidr.trim();
        if !cidr.contains('/') {
            return Err(format!("Invalid address/mask '{cidr}'").into());
        }
        let net: IpNet = cidr
            .parse()
            .map_err(|e| format!("Invalid CIDR '{cidr}': {e}"))?;
        let trunc = net.trunc();
        if trunc != net {
            log::debug!("CIDR {cidr} has host bits set, using {trunc}");
        }
        Ok(Cidr { net: trunc })
    }

    pub fn family(&self) -> Family {
        match self.net {
            IpNet::V4(_) => Family::V4,
            IpNet::V6(_) => Family::V6,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Lowest (network) address of the block.
    pub fn lo(&self) -> IpAddr {
        self.net.network()
    }

    /// Highest address of the block.
    pub fn hi(&self) -> IpAddr {
        self.net.broadcast()
    }

    /// Total number of addresses in the block, saturating for an IPv6 /0.
    pub fn num_addresses(&self) -> u128 {
        let host_bits = u32::from(self.net.max_prefix_len() - self.net.prefix_len());
        1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
    }

    /// Addresses the provider reserves in a single subnet of this family.
    pub fn reserved(&self) -> u128 {
        match self.family() {
            Family::V4 => RESERVED_IPV4,
            Family::V6 => RESERVED_IPV6,
        }
    }

    /// Assignable addresses after a single reservation, never negative.
    pub fn usable(&self) -> u128 {
        self.num_addresses().saturating_sub(self.reserved())
    }
}

impl Serialize for Cidr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cidr {
    fn deserialize<D>(deserializer: D) -> Result<Cidr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cidr::new(&s).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.net)
    }
}

impl std::str::FromStr for Cidr {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cidr::new(s)
    }
}
