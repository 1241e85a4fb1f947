//! IP utilization per address space under the Azure reservation rules.
//!
//! [`compute_utilization`] is pure: all usage observations are passed in, so it can be
//! called from any number of tasks at once.

use super::containment::contains;
use crate::models::{Cidr, Family, SubnetUsage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Policy flags that change what the calculator reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationPolicy {
    /// Report theoretical capacity for address spaces with no subnets.
    #[serde(default = "default_true")]
    pub include_empty: bool,
    /// Compute IPv6 address spaces instead of reporting them as zero.
    #[serde(default)]
    pub ipv6_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UtilizationPolicy {
    fn default() -> Self {
        UtilizationPolicy {
            include_empty: true,
            ipv6_enabled: false,
        }
    }
}

/// Totals for one address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utilization {
    pub subnet_count: usize,
    pub used: u64,
    pub available: u128,
}

/// Compute used/available totals for an address space.
///
/// Subnets are attributed by containment, not by where they were listed. Each retained
/// subnet loses its own reservation (5 for IPv4, 2 for IPv6). An address space without
/// subnets reports `subnet_count == 0` so it stays distinguishable from a full one.
pub fn compute_utilization(
    address_space: &Cidr,
    observations: &[SubnetUsage],
    policy: &UtilizationPolicy,
) -> Utilization {
    if address_space.family() == Family::V6 && !policy.ipv6_enabled {
        log::debug!("IPv6 accounting disabled, skipping {address_space}");
        return Utilization::default();
    }

    let mut used_total: u64 = 0;
    let mut available_total: u128 = 0;
    let mut subnet_ids: HashSet<&str> = HashSet::new();

    for obs in observations {
        let subnet = match Cidr::new(&obs.cidr) {
            Ok(subnet) => subnet,
            Err(e) => {
                log::warn!("Skipping subnet {} with bad CIDR: {e}", obs.subnet_id);
                continue;
            }
        };
        if subnet.family() != address_space.family() || !contains(address_space, &subnet) {
            continue;
        }
        let available = subnet
            .num_addresses()
            .saturating_sub(subnet.reserved())
            .saturating_sub(u128::from(obs.used));
        used_total = used_total.saturating_add(obs.used);
        available_total = available_total.saturating_add(available);
        subnet_ids.insert(obs.subnet_id.as_str());
    }

    let subnet_count = subnet_ids.len();
    if subnet_count == 0 {
        if policy.include_empty {
            return Utilization {
                subnet_count: 0,
                used: 0,
                available: address_space.usable(),
            };
        }
        return Utilization::default();
    }

    Utilization {
        subnet_count,
        used: used_total,
        available: available_total,
    }
}

/// Headroom as a percentage of the address space, one decimal, clamped to [0, 100].
///
/// The denominator removes a single reservation from the whole address space, not the
/// per-subnet reservations used by [`compute_utilization`]. `None` for IPv6 and for
/// blocks with no usable addresses.
pub fn headroom_percent(address_space: &Cidr, available: u128) -> Option<f64> {
    if address_space.family() == Family::V6 {
        return None;
    }
    let usable = address_space.usable();
    if usable == 0 {
        return None;
    }
    let pct = (available as f64 / usable as f64 * 100.0).clamp(0.0, 100.0);
    Some((pct * 10.0).round() / 10.0)
}

/// Qualitative headroom tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Ample,
    Watch,
    Critical,
    Unknown,
}

impl Tier {
    pub fn icon(&self) -> &'static str {
        match self {
            Tier::Ample => "🟢",
            Tier::Watch => "🟠",
            Tier::Critical => "🔴",
            Tier::Unknown => "⚪",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Ample => "ample",
            Tier::Watch => "watch",
            Tier::Critical => "critical",
            Tier::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Headroom thresholds in percent. `green` must be at or above `orange`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    #[serde(default = "default_green")]
    pub green: f64,
    #[serde(default = "default_orange")]
    pub orange: f64,
}

fn default_green() -> f64 {
    60.0
}

fn default_orange() -> f64 {
    30.0
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            green: default_green(),
            orange: default_orange(),
        }
    }
}

impl Thresholds {
    /// Swap inverted thresholds instead of rejecting them.
    pub fn normalized(self) -> Thresholds {
        if self.green < self.orange {
            log::warn!(
                "Thresholds inverted (green={} < orange={}), swapping",
                self.green,
                self.orange
            );
            Thresholds {
                green: self.orange,
                orange: self.green,
            }
        } else {
            self
        }
    }

    pub fn classify(&self, percent: Option<f64>) -> Tier {
        match percent {
            None => Tier::Unknown,
            Some(p) if p >= self.green => Tier::Ample,
            Some(p) if p >= self.orange => Tier::Watch,
            Some(_) => Tier::Critical,
        }
    }
}

/// Group digits by thousands with a space: `1234567` -> `1 234 567`.
pub fn fmt_int(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Free-text summary written to the inventory for one address space.
pub fn summary_line(
    address_space: &Cidr,
    utilization: &Utilization,
    thresholds: &Thresholds,
) -> String {
    let percent = headroom_percent(address_space, utilization.available);
    let tier = thresholds.classify(percent);
    let mut line = format!(
        "{icon} {tier} | 🧩 Subnets: {subnets} | 🔴 Used: {used} | 🟢 Available: {available}",
        icon = tier.icon(),
        subnets = fmt_int(utilization.subnet_count as u128),
        used = fmt_int(u128::from(utilization.used)),
        available = fmt_int(utilization.available),
    );
    if let Some(pct) = percent {
        line.push_str(&format!(" | ⚖️ {pct:.1}%"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        Cidr::new(s).unwrap()
    }

    fn usage(id: &str, cidr: &str, used: u64) -> SubnetUsage {
        SubnetUsage {
            subnet_id: id.to_string(),
            cidr: cidr.to_string(),
            used,
        }
    }

    #[test]
    fn test_empty_space_included() {
        let policy = UtilizationPolicy::default();
        let u = compute_utilization(&cidr("10.1.0.0/24"), &[], &policy);
        assert_eq!(
            u,
            Utilization {
                subnet_count: 0,
                used: 0,
                available: 251
            }
        );
    }

    #[test]
    fn test_empty_space_excluded() {
        let policy = UtilizationPolicy {
            include_empty: false,
            ipv6_enabled: false,
        };
        let u = compute_utilization(&cidr("10.1.0.0/24"), &[], &policy);
        assert_eq!(u, Utilization::default());
    }

    #[test]
    fn test_two_subnets_combined() {
        let obs = vec![
            usage("/s/a", "10.2.0.0/25", 10),
            usage("/s/b", "10.2.0.128/25", 0),
        ];
        let u = compute_utilization(&cidr("10.2.0.0/24"), &obs, &UtilizationPolicy::default());
        assert_eq!(u.subnet_count, 2);
        assert_eq!(u.used, 10);
        assert_eq!(u.available, 236);
    }

    #[test]
    fn test_subnets_attributed_by_containment() {
        // One network, two address spaces, subnets listed in mixed order.
        let obs = vec![
            usage("/s/a", "10.3.1.0/24", 3),
            usage("/s/b", "10.4.0.0/24", 7),
            usage("/s/c", "10.3.0.0/24", 1),
            usage("/s/d", "10.30.0.0/24", 9),
        ];
        let policy = UtilizationPolicy::default();
        let u3 = compute_utilization(&cidr("10.3.0.0/16"), &obs, &policy);
        assert_eq!(u3.subnet_count, 2);
        assert_eq!(u3.used, 4);
        assert_eq!(u3.available, 2 * 251 - 4);

        let u4 = compute_utilization(&cidr("10.4.0.0/16"), &obs, &policy);
        assert_eq!(u4.subnet_count, 1);
        assert_eq!(u4.used, 7);
    }

    #[test]
    fn test_available_never_negative() {
        let obs = vec![usage("/s/a", "10.5.0.0/29", 1_000_000)];
        let u = compute_utilization(&cidr("10.5.0.0/24"), &obs, &UtilizationPolicy::default());
        assert_eq!(u.subnet_count, 1);
        assert_eq!(u.used, 1_000_000);
        assert_eq!(u.available, 0);

        let tiny = vec![usage("/s/t", "10.5.1.0/31", 0)];
        let u = compute_utilization(&cidr("10.5.0.0/16"), &tiny, &UtilizationPolicy::default());
        assert_eq!(u.available, 0);
    }

    #[test]
    fn test_bad_and_foreign_subnets_skipped() {
        let obs = vec![
            usage("/s/bad", "not-a-cidr", 4),
            usage("/s/v6", "fd00::/64", 4),
            usage("/s/ok", "10.6.0.0/28", 2),
        ];
        let u = compute_utilization(&cidr("10.6.0.0/24"), &obs, &UtilizationPolicy::default());
        assert_eq!(u.subnet_count, 1);
        assert_eq!(u.used, 2);
        assert_eq!(u.available, 9);
    }

    #[test]
    fn test_duplicate_subnet_id_counted_once() {
        let obs = vec![
            usage("/s/a", "10.7.0.0/25", 2),
            usage("/s/a", "10.7.0.128/25", 0),
        ];
        let u = compute_utilization(&cidr("10.7.0.0/24"), &obs, &UtilizationPolicy::default());
        assert_eq!(u.subnet_count, 1);
        assert_eq!(u.available, 121 + 123);
    }

    #[test]
    fn test_ipv6_disabled_and_enabled() {
        let obs = vec![usage("/s/a", "fd00:0:0:1::/64", 3)];
        let space = cidr("fd00::/48");
        let off = compute_utilization(&space, &obs, &UtilizationPolicy::default());
        assert_eq!(off, Utilization::default());

        let policy = UtilizationPolicy {
            include_empty: true,
            ipv6_enabled: true,
        };
        let on = compute_utilization(&space, &obs, &policy);
        assert_eq!(on.subnet_count, 1);
        assert_eq!(on.used, 3);
        assert_eq!(on.available, (1u128 << 64) - 2 - 3);
    }

    #[test]
    fn test_headroom_percent() {
        assert_eq!(headroom_percent(&cidr("10.1.0.0/24"), 251), Some(100.0));
        assert_eq!(headroom_percent(&cidr("10.2.0.0/24"), 236), Some(94.0));
        assert_eq!(headroom_percent(&cidr("10.2.0.0/24"), 0), Some(0.0));
        assert_eq!(headroom_percent(&cidr("10.2.0.0/24"), 1000), Some(100.0));
        assert_eq!(headroom_percent(&cidr("10.2.0.0/24"), 125), Some(49.8));
        assert_eq!(headroom_percent(&cidr("10.2.0.0/30"), 0), None);
        assert_eq!(headroom_percent(&cidr("fd00::/48"), 10), None);
    }

    #[test]
    fn test_thresholds_inverted_swap() {
        let t = Thresholds {
            green: 20.0,
            orange: 80.0,
        }
        .normalized();
        assert_eq!(t.green, 80.0);
        assert_eq!(t.orange, 20.0);
        assert_eq!(t.classify(Some(50.0)), Tier::Watch);
    }

    #[test]
    fn test_thresholds_classify() {
        let t = Thresholds::default();
        assert_eq!(t.classify(Some(60.0)), Tier::Ample);
        assert_eq!(t.classify(Some(59.9)), Tier::Watch);
        assert_eq!(t.classify(Some(30.0)), Tier::Watch);
        assert_eq!(t.classify(Some(29.9)), Tier::Critical);
        assert_eq!(t.classify(None), Tier::Unknown);
    }

    #[test]
    fn test_fmt_int() {
        assert_eq!(fmt_int(0), "0");
        assert_eq!(fmt_int(999), "999");
        assert_eq!(fmt_int(1000), "1 000");
        assert_eq!(fmt_int(65531), "65 531");
        assert_eq!(fmt_int(1234567), "1 234 567");
    }

    #[test]
    fn test_summary_line() {
        let u = Utilization {
            subnet_count: 2,
            used: 10,
            available: 236,
        };
        let line = summary_line(&cidr("10.2.0.0/24"), &u, &Thresholds::default());
        assert_eq!(
            line,
            "🟢 ample | 🧩 Subnets: 2 | 🔴 Used: 10 | 🟢 Available: 236 | ⚖️ 94.0%"
        );

        let v6 = summary_line(&cidr("fd00::/48"), &Utilization::default(), &Thresholds::default());
        assert!(v6.starts_with("⚪ unknown"));
        assert!(!v6.contains('%'));
    }
}
