//! # Index Orders
//!
//! Triples are kept sorted in three component orders: SPO, POS and OSP.
//! Between them every combination of bound components is a key prefix of
//! one order, so a pattern always maps to one contiguous key range.
//!
//! | bound     | order | prefix   |
//! |-----------|-------|----------|
//! | s, p, o   | SPO   | (s,p,o)  |
//! | s, p      | SPO   | (s,p)    |
//! | s, o      | OSP   | (o,s)    |
//! | s         | SPO   | (s)      |
//! | p, o      | POS   | (p,o)    |
//! | p         | POS   | (p)      |
//! | o         | OSP   | (o)      |
//! | none      | SPO   | ()       |

use crate::{TermId, Triple};

/// A triple laid out in one index order.
pub type Key = (u64, u64, u64);

/// One of the three stored component orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexOrder {
    Spo,
    Pos,
    Osp,
}

impl IndexOrder {
    /// All orders, in storage tag order.
    pub const ALL: [IndexOrder; 3] = [IndexOrder::Spo, IndexOrder::Pos, IndexOrder::Osp];

    /// Storage tag of this order.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            IndexOrder::Spo => 0,
            IndexOrder::Pos => 1,
            IndexOrder::Osp => 2,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            IndexOrder::Spo => "spo",
            IndexOrder::Pos => "pos",
            IndexOrder::Osp => "osp",
        }
    }

    /// Lay `triple` out in this order.
    #[must_use]
    pub const fn key(self, triple: Triple) -> Key {
        let (s, p, o) = triple.spo();
        match self {
            IndexOrder::Spo => (s, p, o),
            IndexOrder::Pos => (p, o, s),
            IndexOrder::Osp => (o, s, p),
        }
    }

    /// Inverse of [`IndexOrder::key`].
    #[must_use]
    pub const fn triple(self, key: Key) -> Triple {
        match self {
            IndexOrder::Spo => Triple::new(key.0, key.1, key.2),
            IndexOrder::Pos => Triple::new(key.2, key.0, key.1),
            IndexOrder::Osp => Triple::new(key.1, key.2, key.0),
        }
    }
}

/// A pattern whose bound components are already dictionary identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodedPattern {
    pub subject: Option<TermId>,
    pub predicate: Option<TermId>,
    pub object: Option<TermId>,
}

impl EncodedPattern {
    /// The order whose key prefix covers the bound components.
    #[must_use]
    pub const fn order(&self) -> IndexOrder {
        match (
            self.subject.is_some(),
            self.predicate.is_some(),
            self.object.is_some(),
        ) {
            (true, false, true) | (false, false, true) => IndexOrder::Osp,
            (false, true, _) => IndexOrder::Pos,
            _ => IndexOrder::Spo,
        }
    }

    /// Inclusive key bounds of the range matching this pattern in [`order`](Self::order).
    #[must_use]
    pub fn bounds(&self) -> (Key, Key) {
        let (s, p, o) = (
            self.subject.map(|t| t.0),
            self.predicate.map(|t| t.0),
            self.object.map(|t| t.0),
        );
        let prefix: [Option<u64>; 3] = match self.order() {
            IndexOrder::Spo => [s, p, o],
            IndexOrder::Pos => [p, o, s],
            IndexOrder::Osp => [o, s, p],
        };
        let lo = (
            prefix[0].unwrap_or(0),
            prefix[1].unwrap_or(0),
            prefix[2].unwrap_or(0),
        );
        let hi = (
            prefix[0].unwrap_or(u64::MAX),
            prefix[1].unwrap_or(u64::MAX),
            prefix[2].unwrap_or(u64::MAX),
        );
        (lo, hi)
    }

    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.subject.is_none() && self.predicate.is_none() && self.object.is_none()
    }
}
