//! Region, resource-group and name filters applied to scanned networks.

use crate::models::VirtualNetwork;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeExclude {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePatterns {
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Filter section of the configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    #[serde(default)]
    pub regions: IncludeExclude,
    #[serde(default)]
    pub resource_groups: IncludeExclude,
    #[serde(default)]
    pub resource_names: NamePatterns,
}

/// Compiled form of [`FilterConfig`].
#[derive(Debug, Clone, Default)]
pub struct NetworkFilter {
    regions: IncludeExclude,
    resource_groups: IncludeExclude,
    name_include: Vec<Regex>,
    name_exclude: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, Box<dyn Error>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| -> Box<dyn Error> {
                format!("Invalid name pattern '{p}': {e}").into()
            })
        })
        .collect()
}

fn allowed(value: &str, rule: &IncludeExclude) -> bool {
    let listed = |list: &[String]| list.iter().any(|v| v.eq_ignore_ascii_case(value));
    if !rule.include.is_empty() && !listed(&rule.include) {
        return false;
    }
    !listed(&rule.exclude)
}

impl NetworkFilter {
    pub fn new(config: &FilterConfig) -> Result<NetworkFilter, Box<dyn Error>> {
        Ok(NetworkFilter {
            regions: config.regions.clone(),
            resource_groups: config.resource_groups.clone(),
            name_include: compile(&config.resource_names.include_patterns)?,
            name_exclude: compile(&config.resource_names.exclude_patterns)?,
        })
    }

    fn name_allowed(&self, name: &str) -> bool {
        if !self.name_include.is_empty() && !self.name_include.iter().any(|r| r.is_match(name)) {
            return false;
        }
        !self.name_exclude.iter().any(|r| r.is_match(name))
    }

    /// Drop networks outside the configured scope.
    ///
    /// Filters select networks only. Every subnet of a kept network stays, as the usage
    /// of an address space depends on all subnets carved from it.
    pub fn apply(&self, vnets: Vec<VirtualNetwork>) -> Vec<VirtualNetwork> {
        let before = vnets.len();
        let kept: Vec<VirtualNetwork> = vnets
            .into_iter()
            .filter(|v| {
                let keep = allowed(&v.location, &self.regions)
                    && allowed(&v.resource_group, &self.resource_groups)
                    && self.name_allowed(&v.name);
                if !keep {
                    log::debug!("VNet {} ignored by filters", v.name);
                }
                keep
            })
            .collect();
        if kept.len() != before {
            log::info!("After filtering: {} of {} VNets remaining", kept.len(), before);
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subnet;

    fn vnet(name: &str, rg: &str, location: &str, subnets: &[&str]) -> VirtualNetwork {
        VirtualNetwork {
            name: name.to_string(),
            resource_group: rg.to_string(),
            location: location.to_string(),
            subnets: subnets
                .iter()
                .map(|s| Subnet {
                    name: s.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_filters_keep_all() {
        let filter = NetworkFilter::new(&FilterConfig::default()).unwrap();
        let out = filter.apply(vec![vnet("a", "rg", "westeurope", &["s1"])]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].subnets.len(), 1);
    }

    #[test]
    fn test_region_and_rg() {
        let config = FilterConfig {
            regions: IncludeExclude {
                include: vec!["WestEurope".to_string(), "northeurope".to_string()],
                exclude: vec![],
            },
            resource_groups: IncludeExclude {
                include: vec![],
                exclude: vec!["sandbox-rg".to_string()],
            },
            ..Default::default()
        };
        let filter = NetworkFilter::new(&config).unwrap();
        let out = filter.apply(vec![
            vnet("a", "net-rg", "westeurope", &[]),
            vnet("b", "net-rg", "eastus", &[]),
            vnet("c", "sandbox-rg", "northeurope", &[]),
        ]);
        let names: Vec<&str> = out.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_name_patterns_select_networks() {
        let config = FilterConfig {
            resource_names: NamePatterns {
                include_patterns: vec![],
                exclude_patterns: vec!["^pkrsn".to_string(), "^restore-".to_string()],
            },
            ..Default::default()
        };
        let filter = NetworkFilter::new(&config).unwrap();
        let out = filter.apply(vec![
            vnet("hub", "rg", "westeurope", &["app"]),
            vnet("pkrsn1ooslfxj77", "rg", "westeurope", &["default"]),
            vnet("restore-vnet", "rg", "westeurope", &[]),
        ]);
        let names: Vec<&str> = out.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["hub"]);
    }

    #[test]
    fn test_subnets_of_kept_network_untouched() {
        let config = FilterConfig {
            resource_names: NamePatterns {
                include_patterns: vec!["^hub-".to_string()],
                exclude_patterns: vec!["^pkrsn".to_string()],
            },
            ..Default::default()
        };
        let filter = NetworkFilter::new(&config).unwrap();
        let out = filter.apply(vec![vnet(
            "hub-prod",
            "rg",
            "westeurope",
            &["workload", "default", "pkrsn-build"],
        )]);
        assert_eq!(out.len(), 1);
        let subnets: Vec<&str> = out[0].subnets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(subnets, vec!["workload", "default", "pkrsn-build"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FilterConfig {
            resource_names: NamePatterns {
                include_patterns: vec!["(".to_string()],
                exclude_patterns: vec![],
            },
            ..Default::default()
        };
        assert!(NetworkFilter::new(&config).is_err());
    }
}
