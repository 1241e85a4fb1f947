//! Aggregate and role lookup for one utilization record.

use crate::models::inventory::{Aggregate, Role};
use crate::models::Cidr;
use crate::processing::first_match;

/// A role together with the lowercase substring that selects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub match_on: String,
    pub role: Role,
}

/// First aggregate, in configuration order, containing the address space.
pub fn match_aggregate<'a>(aggregates: &'a [Aggregate], address_space: &Cidr) -> Option<&'a Aggregate> {
    first_match(aggregates, address_space)
}

/// First role, in configuration order, whose matcher appears in the subscription name.
pub fn match_role<'a>(roles: &'a [ResolvedRole], subscription_name: &str) -> Option<&'a ResolvedRole> {
    let name = subscription_name.to_lowercase();
    roles.iter().find(|r| !r.match_on.is_empty() && name.contains(&r.match_on))
}
