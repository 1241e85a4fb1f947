//! One-time rewrite of legacy subscription values.
//!
//! Earlier sync runs stored the subscription as `"<display name> - <subscription guid>"`.
//! The attribute now holds the display name only. This step runs on every existing
//! prefix before the regular diff and is the only one that replaces a non-empty
//! subscription value.

use regex::Regex;
use std::sync::OnceLock;

static GUID_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_guid_regex() -> &'static Regex {
    GUID_REGEX.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
            .expect("Invalid Regex")
    })
}

/// True if the value embeds a subscription GUID.
pub fn is_legacy_subscription_value(value: &str) -> bool {
    get_guid_regex().is_match(value)
}

/// Clean value to write when `current` is a legacy value, `None` otherwise.
///
/// The clean value is the display name of the scanned subscription.
pub fn migrate_subscription_value(current: Option<&str>, display_name: &str) -> Option<String> {
    let current = current?;
    if !is_legacy_subscription_value(current) || current == display_name {
        return None;
    }
    Some(display_name.to_string())
}
