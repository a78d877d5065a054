//! Conversation model: the single direct-message thread between two members.
//!
//! A conversation is an *unordered* pair of memberships. It is stored with the
//! pair in canonical order (smaller id first, by `Uuid`'s byte-wise `Ord`), and
//! the storage layer keeps `(member_one_id, member_two_id)` unique, so each
//! unordered pair maps to exactly one row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub member_one_id: Uuid,
    pub member_two_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A member pair normalized into canonical order.
///
/// Construction fails for a self-pair, so holding a `MemberPair` proves the two
/// sides differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberPair {
    first: Uuid,
    second: Uuid,
}

impl MemberPair {
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> Uuid {
        self.first
    }

    pub fn second(&self) -> Uuid {
        self.second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_eq!(MemberPair::new(a, b), MemberPair::new(b, a));
    }

    #[test]
    fn pair_puts_smaller_id_first() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-00000000000a").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-00000000000b").unwrap();
        let pair = MemberPair::new(b, a).unwrap();
        assert_eq!(pair.first(), a);
        assert_eq!(pair.second(), b);
        // Byte order agrees with the text form stored in SQL
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn self_pair_is_rejected() {
        let a = Uuid::now_v7();
        assert!(MemberPair::new(a, a).is_none());
    }
}
