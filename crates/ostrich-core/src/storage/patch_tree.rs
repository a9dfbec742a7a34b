//! # Patch Tree
//!
//! The patch tree records, for every triple any patch has touched, the list
//! of versions at which it was added or deleted. It is the only structure
//! that grows after version 0.
//!
//! A triple's presence at version V is decided by the last change at or
//! before V; with no such change the snapshot decides. The change list is
//! stored once, under the SPO key. The POS and OSP tables hold bare keys
//! and are resolved through SPO, which keeps every append to one record
//! write plus two key inserts per element.

use super::{PATCH_OSP, PATCH_POS, PATCH_SPO, PATCH_VERSIONS};
use crate::index::{EncodedPattern, IndexOrder, Key};
use crate::snapshot::Snapshot;
use crate::types::{serialization_err, storage_err};
use crate::{EncodedElement, StoreError, Triple, Version};
use redb::{ReadOnlyTable, ReadTransaction, ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::ops::Bound;

// =============================================================================
// TRIPLE HISTORY
// =============================================================================

/// One recorded change of a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub version: Version,
    pub addition: bool,
}

/// Every change of one triple, in version order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleHistory {
    changes: Vec<Change>,
}

impl TripleHistory {
    /// The state set by the last change at or before `version`.
    #[must_use]
    pub fn state_at(&self, version: Version) -> Option<bool> {
        let upto = self.changes.partition_point(|c| c.version <= version);
        upto.checked_sub(1).map(|i| self.changes[i].addition)
    }

    /// Presence at `version`, falling back to snapshot membership.
    #[must_use]
    pub fn present_at(&self, in_snapshot: bool, version: Version) -> bool {
        self.state_at(version).unwrap_or(in_snapshot)
    }

    /// Every version in `0..=max` at which the triple is present.
    #[must_use]
    pub fn versions_present(&self, in_snapshot: bool, max: Version) -> Vec<Version> {
        let mut versions = Vec::new();
        let mut present = in_snapshot;
        let mut from: Version = 0;
        for change in self.changes.iter().take_while(|c| c.version <= max) {
            if present {
                versions.extend(from..change.version);
            }
            present = change.addition;
            from = change.version;
        }
        if present {
            versions.extend(from..=max);
        }
        versions
    }

    /// Append a change. Versions must be recorded in increasing order.
    pub fn record(&mut self, version: Version, addition: bool) -> Result<(), StoreError> {
        if let Some(last) = self.changes.last()
            && last.version >= version
        {
            return Err(StoreError::Conflict(format!(
                "change for version {} recorded after version {}",
                version, last.version
            )));
        }
        self.changes.push(Change { version, addition });
        Ok(())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        postcard::from_bytes(bytes).map_err(serialization_err)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        postcard::to_allocvec(self).map_err(serialization_err)
    }
}

// =============================================================================
// COMMIT & LOAD
// =============================================================================

/// Outcome of writing one patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PatchSummary {
    pub additions: u64,
    pub deletions: u64,
    /// Elements that changed presence: absent before and added.
    pub effective_additions: u64,
    /// Elements that changed presence: present before and deleted.
    pub effective_deletions: u64,
}

impl PatchSummary {
    /// Elements that restated the current state.
    pub fn no_ops(&self) -> u64 {
        self.additions + self.deletions - self.effective_additions - self.effective_deletions
    }
}

/// Write the elements of `version` into the patch tree.
///
/// Must run inside the version's write transaction; nothing is visible
/// until the caller commits.
pub(crate) fn write_patch(
    txn: &WriteTransaction,
    version: Version,
    elements: &[EncodedElement],
    snapshot: &Snapshot,
) -> Result<PatchSummary, StoreError> {
    let mut spo = txn.open_table(PATCH_SPO).map_err(storage_err)?;
    let mut pos = txn.open_table(PATCH_POS).map_err(storage_err)?;
    let mut osp = txn.open_table(PATCH_OSP).map_err(storage_err)?;
    let mut by_version = txn.open_table(PATCH_VERSIONS).map_err(storage_err)?;

    let mut summary = PatchSummary::default();
    for element in elements {
        let triple = element.triple;
        let key = triple.spo();
        let mut history = match spo.get(key).map_err(storage_err)? {
            Some(bytes) => TripleHistory::from_bytes(bytes.value())?,
            None => TripleHistory::default(),
        };
        let before = history.present_at(snapshot.contains(&triple), version.saturating_sub(1));
        history.record(version, element.addition)?;

        if element.addition {
            summary.additions += 1;
            if !before {
                summary.effective_additions += 1;
            }
        } else {
            summary.deletions += 1;
            if before {
                summary.effective_deletions += 1;
            }
        }

        let bytes = history.to_bytes()?;
        spo.insert(key, bytes.as_slice()).map_err(storage_err)?;
        pos.insert(IndexOrder::Pos.key(triple), ()).map_err(storage_err)?;
        osp.insert(IndexOrder::Osp.key(triple), ()).map_err(storage_err)?;
        by_version
            .insert((version, key.0, key.1, key.2), element.addition)
            .map_err(storage_err)?;
    }
    Ok(summary)
}

/// The elements committed at `version`, in SPO order.
pub(crate) fn load_patch(
    txn: &ReadTransaction,
    version: Version,
) -> Result<Vec<EncodedElement>, StoreError> {
    let table = txn.open_table(PATCH_VERSIONS).map_err(storage_err)?;
    let mut elements = Vec::new();
    for entry in table
        .range((version, 0u64, 0u64, 0u64)..=(version, u64::MAX, u64::MAX, u64::MAX))
        .map_err(storage_err)?
    {
        let (key, value) = entry.map_err(storage_err)?;
        let (_, s, p, o) = key.value();
        elements.push(EncodedElement {
            triple: Triple::new(s, p, o),
            addition: value.value(),
        });
    }
    Ok(elements)
}

/// Number of patch-tree entries matching `pattern`.
///
/// Counts touched triples, not live ones; used as index statistics.
pub(crate) fn count_entries(
    txn: &ReadTransaction,
    pattern: &EncodedPattern,
) -> Result<u64, StoreError> {
    if pattern.is_wildcard() {
        let table = txn.open_table(PATCH_SPO).map_err(storage_err)?;
        return table.len().map_err(storage_err);
    }
    let (lo, hi) = pattern.bounds();
    let count = match pattern.order() {
        IndexOrder::Spo => {
            let table = txn.open_table(PATCH_SPO).map_err(storage_err)?;
            table.range(lo..=hi).map_err(storage_err)?.count()
        }
        IndexOrder::Pos => {
            let table = txn.open_table(PATCH_POS).map_err(storage_err)?;
            table.range(lo..=hi).map_err(storage_err)?.count()
        }
        IndexOrder::Osp => {
            let table = txn.open_table(PATCH_OSP).map_err(storage_err)?;
            table.range(lo..=hi).map_err(storage_err)?.count()
        }
    };
    Ok(count as u64)
}

// =============================================================================
// PAGED SCAN
// =============================================================================

/// Pages through the patch-tree range of one pattern.
///
/// Each page opens a fresh bounded range after the last key seen, so no
/// storage iterator outlives a page.
pub(crate) struct PatchCursor {
    spo: ReadOnlyTable<Key, &'static [u8]>,
    secondary: Option<ReadOnlyTable<Key, ()>>,
    order: IndexOrder,
    lower: Bound<Key>,
    upper: Key,
    exhausted: bool,
}

impl PatchCursor {
    pub fn open(txn: &ReadTransaction, pattern: &EncodedPattern) -> Result<Self, StoreError> {
        let order = pattern.order();
        let (lo, hi) = pattern.bounds();
        let spo = txn.open_table(PATCH_SPO).map_err(storage_err)?;
        let secondary = match order {
            IndexOrder::Spo => None,
            IndexOrder::Pos => Some(txn.open_table(PATCH_POS).map_err(storage_err)?),
            IndexOrder::Osp => Some(txn.open_table(PATCH_OSP).map_err(storage_err)?),
        };
        Ok(Self {
            spo,
            secondary,
            order,
            lower: Bound::Included(lo),
            upper: hi,
            exhausted: false,
        })
    }

    /// The next `page_size` entries in index order; empty once exhausted.
    pub fn next_page(&mut self, page_size: usize) -> Result<Vec<(Key, TripleHistory)>, StoreError> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let bounds = (self.lower, Bound::Included(self.upper));
        let mut keys: Vec<(Key, Option<TripleHistory>)> = Vec::with_capacity(page_size);
        match &self.secondary {
            None => {
                for entry in self.spo.range(bounds).map_err(storage_err)?.take(page_size) {
                    let (key, value) = entry.map_err(storage_err)?;
                    keys.push((key.value(), Some(TripleHistory::from_bytes(value.value())?)));
                }
            }
            Some(table) => {
                for entry in table.range(bounds).map_err(storage_err)?.take(page_size) {
                    let (key, _) = entry.map_err(storage_err)?;
                    keys.push((key.value(), None));
                }
            }
        }

        match keys.last() {
            Some(&(last, _)) if keys.len() == page_size && last != self.upper => {
                self.lower = Bound::Excluded(last);
            }
            _ => self.exhausted = true,
        }

        keys.into_iter()
            .map(|(key, history)| match history {
                Some(history) => Ok((key, history)),
                None => {
                    let triple = self.order.triple(key);
                    let history = self.history(&triple)?.ok_or_else(|| {
                        StoreError::Serialization(format!(
                            "{} index entry without history: {:?}",
                            self.order.name(),
                            triple.spo()
                        ))
                    })?;
                    Ok((key, history))
                }
            })
            .collect()
    }

    /// Point lookup of one triple's history.
    pub fn history(&self, triple: &Triple) -> Result<Option<TripleHistory>, StoreError> {
        match self.spo.get(triple.spo()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(TripleHistory::from_bytes(bytes.value())?)),
            None => Ok(None),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
