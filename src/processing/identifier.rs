//! Short-name generation for records created per subscription.
//!
//! Subscription display names are not unique, so every generated name carries a suffix
//! taken from the subscription id.

use regex::Regex;
use std::sync::OnceLock;

static NON_SLUG_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_non_slug_regex() -> &'static Regex {
    NON_SLUG_REGEX.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("Invalid Regex"))
}

/// Number of id characters kept in the suffix (the last GUID group).
pub const SUFFIX_LEN: usize = 12;

/// Lowercase, ASCII-only slug with runs of other characters folded into one `-`.
pub fn slugify(label: &str) -> String {
    let lower = label.to_lowercase();
    get_non_slug_regex()
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Sanitized tail of a subscription id, e.g. `0a1b2c3d4e5f` for a GUID ending in that group.
pub fn subscription_suffix(subscription_id: &str) -> String {
    let clean: String = subscription_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let start = clean.len().saturating_sub(SUFFIX_LEN);
    clean[start..].to_string()
}

/// Unique short name `<label-slug>-<id-suffix>`, at most `max_len` characters.
///
/// The label part is truncated first; the suffix is always kept whole when it fits.
pub fn unique_short_name(label: &str, subscription_id: &str, max_len: usize) -> String {
    let suffix = subscription_suffix(subscription_id);
    let mut base = slugify(label);
    if base.is_empty() {
        base = "subscription".to_string();
    }
    if suffix.is_empty() {
        log::warn!("Subscription id '{subscription_id}' has no usable characters for a suffix");
        base.truncate(max_len);
        return base;
    }
    if suffix.len() + 1 >= max_len {
        return suffix[..max_len.min(suffix.len())].to_string();
    }
    base.truncate(max_len - suffix.len() - 1);
    let base = base.trim_end_matches('-');
    format!("{base}-{suffix}")
}
