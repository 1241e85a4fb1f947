//! Counters reported at the end of a run.

use serde::Serialize;
use std::fmt;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Existing prefixes written (or that would be, in a dry run).
    pub updated: usize,
    /// Prefixes created for address spaces missing from the inventory.
    pub created: usize,
    /// Records not processed because their CIDR matched several prefixes in strict mode.
    pub skipped: usize,
    /// Records whose CIDR matched more than one prefix, whatever the mode.
    pub ambiguous: usize,
    /// Records with no matching prefix while creation is off.
    pub not_found: usize,
    /// Records that hit a store error other than a creation race.
    pub failed: usize,
}

impl RunSummary {
    pub fn merge(&mut self, other: RunSummary) {
        self.updated += other.updated;
        self.created += other.created;
        self.skipped += other.skipped;
        self.ambiguous += other.ambiguous;
        self.not_found += other.not_found;
        self.failed += other.failed;
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updated={}, created={}, skipped={}, ambiguous={}, not_found={}, failed={}",
            self.updated, self.created, self.skipped, self.ambiguous, self.not_found, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_display() {
        let mut total = RunSummary {
            updated: 1,
            ..Default::default()
        };
        total.merge(RunSummary {
            updated: 2,
            ambiguous: 1,
            ..Default::default()
        });
        assert_eq!(
            total.to_string(),
            "updated=3, created=0, skipped=0, ambiguous=1, not_found=0, failed=0"
        );
    }
}
