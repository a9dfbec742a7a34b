//! # Snapshot Store
//!
//! The immutable triple set of version 0.
//!
//! The snapshot keeps its triples in all three index orders as sorted key
//! arrays, so any pattern resolves to one contiguous slice found by two
//! binary searches. On disk each order is cut into blocks of
//! `snapshot_block_size` keys and written with the block codec of
//! [`crate::formats::block`].

use crate::formats::{decode_block, encode_block};
use crate::index::{EncodedPattern, IndexOrder, Key};
use crate::types::storage_err;
use crate::{StoreError, Triple};
use redb::{ReadableTable, Table};
use std::ops::Range;

/// Sorted snapshot keys in every index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    spo: Vec<Key>,
    pos: Vec<Key>,
    osp: Vec<Key>,
}

impl Snapshot {
    /// Build a snapshot from encoded triples.
    ///
    /// Fails with `InvalidArgument` if a triple occurs twice.
    pub fn build(triples: impl IntoIterator<Item = Triple>) -> Result<Self, StoreError> {
        let mut spo: Vec<Key> = triples.into_iter().map(|t| t.spo()).collect();
        spo.sort_unstable();
        if let Some(window) = spo.windows(2).find(|w| w[0] == w[1]) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate snapshot triple {:?}",
                window[0]
            )));
        }
        Ok(Self::from_spo(spo))
    }

    fn from_spo(spo: Vec<Key>) -> Self {
        let reorder = |order: IndexOrder| {
            let mut keys: Vec<Key> = spo
                .iter()
                .map(|&k| order.key(IndexOrder::Spo.triple(k)))
                .collect();
            keys.sort_unstable();
            keys
        };
        let pos = reorder(IndexOrder::Pos);
        let osp = reorder(IndexOrder::Osp);
        Self { spo, pos, osp }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spo.is_empty()
    }

    /// All keys in `order`.
    #[must_use]
    pub fn keys(&self, order: IndexOrder) -> &[Key] {
        match order {
            IndexOrder::Spo => &self.spo,
            IndexOrder::Pos => &self.pos,
            IndexOrder::Osp => &self.osp,
        }
    }

    /// The keys matching `pattern`, laid out in `pattern.order()`.
    #[must_use]
    pub fn range(&self, pattern: &EncodedPattern) -> &[Key] {
        &self.keys(pattern.order())[self.span(pattern)]
    }

    /// Index positions of [`range`](Self::range) within `keys(pattern.order())`.
    #[must_use]
    pub fn span(&self, pattern: &EncodedPattern) -> Range<usize> {
        let keys = self.keys(pattern.order());
        let (lo, hi) = pattern.bounds();
        let start = keys.partition_point(|k| *k < lo);
        let end = keys.partition_point(|k| *k <= hi);
        start..end.max(start)
    }

    /// Exact number of snapshot triples matching `pattern`.
    #[must_use]
    pub fn count(&self, pattern: &EncodedPattern) -> usize {
        self.range(pattern).len()
    }

    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.spo.binary_search(&triple.spo()).is_ok()
    }

    /// Iterate all triples in SPO order.
    pub fn triples(&self) -> impl Iterator<Item = Triple> + '_ {
        self.spo.iter().map(|&k| IndexOrder::Spo.triple(k))
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Write every order as compressed blocks. Returns the number of blocks.
    pub(crate) fn persist(
        &self,
        table: &mut Table<'_, (u8, u64), &'static [u8]>,
        block_size: usize,
    ) -> Result<u64, StoreError> {
        let block_size = block_size.max(1);
        let mut written = 0u64;
        for order in IndexOrder::ALL {
            for (block, chunk) in self.keys(order).chunks(block_size).enumerate() {
                let bytes = encode_block(chunk)?;
                table
                    .insert((order.tag(), block as u64), bytes.as_slice())
                    .map_err(storage_err)?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Read the snapshot back from its blocks.
    pub(crate) fn load<T>(table: &T) -> Result<Self, StoreError>
    where
        T: ReadableTable<(u8, u64), &'static [u8]>,
    {
        let mut snapshot = Self::default();
        for order in IndexOrder::ALL {
            let keys = match order {
                IndexOrder::Spo => &mut snapshot.spo,
                IndexOrder::Pos => &mut snapshot.pos,
                IndexOrder::Osp => &mut snapshot.osp,
            };
            let range = table
                .range((order.tag(), 0u64)..=(order.tag(), u64::MAX))
                .map_err(storage_err)?;
            for entry in range {
                let (_, value) = entry.map_err(storage_err)?;
                let block = decode_block(value.value())?;
                if let (Some(last), Some(first)) = (keys.last(), block.first())
                    && first <= last
                {
                    return Err(StoreError::Serialization(format!(
                        "Snapshot blocks out of order in {} index",
                        order.name()
                    )));
                }
                keys.extend(block);
            }
        }
        if snapshot.pos.len() != snapshot.spo.len() || snapshot.osp.len() != snapshot.spo.len() {
            return Err(StoreError::Serialization(
                "Snapshot indexes disagree in size".to_string(),
            ));
        }
        Ok(snapshot)
    }
}

// =============================================================================
// TESTS
// =============================================================================
