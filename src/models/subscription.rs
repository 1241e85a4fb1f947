//! Azure subscription references.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniform shape for a subscription, whatever source listed it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionRef {
    /// Subscription GUID.
    pub subscription_id: String,
    /// Human display name, not unique across a tenant.
    pub display_name: String,
}

impl fmt::Display for SubscriptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.display_name, self.subscription_id)
    }
}

/// A subscription together with the management-group label it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionScope {
    pub management_group: String,
    pub subscription: SubscriptionRef,
}
