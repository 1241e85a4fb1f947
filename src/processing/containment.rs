//! CIDR containment matching.
//!
//! Pure predicates, no I/O. Matching is family-sensitive and compares address ranges,
//! never string prefixes: `10.1.0.0/16` does not contain `10.10.0.0/16`.

use crate::models::inventory::Aggregate;
use crate::models::Cidr;

/// Anything that is anchored on a CIDR block.
pub trait Block {
    fn block(&self) -> &Cidr;
}

impl Block for Cidr {
    fn block(&self) -> &Cidr {
        self
    }
}

impl Block for Aggregate {
    fn block(&self) -> &Cidr {
        &self.prefix
    }
}

/// True if the whole range of `inner` lies inside `outer`. An IPv4 block never contains
/// an IPv6 block and vice versa. A block contains itself.
pub fn contains(outer: &Cidr, inner: &Cidr) -> bool {
    outer.family() == inner.family()
        && outer.prefix_len() <= inner.prefix_len()
        && outer.lo() <= inner.lo()
        && inner.hi() <= outer.hi()
}

/// First candidate, in caller order, whose block contains `target`.
///
/// Ties go to declaration order, not to the most specific block.
pub fn first_match<'a, T: Block>(candidates: &'a [T], target: &Cidr) -> Option<&'a T> {
    candidates.iter().find(|c| contains(c.block(), target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        Cidr::new(s).unwrap()
    }

    #[test]
    fn test_contains_subset() {
        assert!(contains(&cidr("10.0.0.0/8"), &cidr("10.1.0.0/16")));
        assert!(contains(&cidr("10.2.0.0/24"), &cidr("10.2.0.128/25")));
        assert!(contains(&cidr("10.2.0.0/24"), &cidr("10.2.0.0/24")));
        assert!(contains(&cidr("0.0.0.0/0"), &cidr("192.168.1.7/32")));
        assert!(contains(&cidr("fd00::/48"), &cidr("fd00:0:0:1::/64")));
    }

    #[test]
    fn test_contains_not_string_prefix() {
        assert!(!contains(&cidr("10.1.0.0/16"), &cidr("10.10.0.0/16")));
        assert!(!contains(&cidr("10.1.0.0/16"), &cidr("10.100.1.0/24")));
    }

    #[test]
    fn test_contains_disjoint_and_larger() {
        assert!(!contains(&cidr("10.2.0.0/25"), &cidr("10.2.0.128/25")));
        assert!(!contains(&cidr("10.2.0.0/25"), &cidr("10.2.0.0/24")));
        assert!(!contains(&cidr("172.16.0.0/12"), &cidr("10.0.0.0/8")));
    }

    #[test]
    fn test_contains_cross_family() {
        assert!(!contains(&cidr("0.0.0.0/0"), &cidr("::/128")));
        assert!(!contains(&cidr("::/0"), &cidr("10.0.0.0/8")));
        assert!(!contains(&cidr("::ffff:0:0/96"), &cidr("10.0.0.0/8")));
    }

    #[test]
    fn test_first_match_declaration_order() {
        let candidates = vec![cidr("10.0.0.0/8"), cidr("10.1.0.0/16"), cidr("172.16.0.0/12")];
        let hit = first_match(&candidates, &cidr("10.1.2.0/24"));
        assert_eq!(hit, Some(&candidates[0]));

        let reversed = vec![cidr("10.1.0.0/16"), cidr("10.0.0.0/8")];
        assert_eq!(first_match(&reversed, &cidr("10.1.2.0/24")), Some(&reversed[0]));
        assert_eq!(first_match(&reversed, &cidr("10.2.0.0/24")), Some(&reversed[1]));
        assert_eq!(first_match(&candidates, &cidr("192.168.0.0/24")), None);
        assert_eq!(first_match::<Cidr>(&[], &cidr("10.0.0.0/24")), None);
    }
}
