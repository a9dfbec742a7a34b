//! # Query Evaluator
//!
//! One pull-based evaluator serves all three query modes. It merge-scans
//! the snapshot's key slice against pages of the patch tree, both in the
//! pattern's index order, and hands every candidate triple to a
//! [`Materialization`] policy that decides whether and how it is emitted:
//!
//! - [`AtVersion`]: the triple is present at one version
//! - [`Between`]: presence differs between two versions
//! - [`AllVersions`]: the triple is present at any version, with the list
//!
//! Results come out in index order. Cancellation is checked between patch
//! pages and every `page_size` candidates.

use crate::index::{EncodedPattern, IndexOrder, Key};
use crate::snapshot::Snapshot;
use crate::storage::patch_tree::{PatchCursor, TripleHistory};
use crate::{StoreError, Triple, Version};
use redb::ReadTransaction;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// CANCELLATION
// =============================================================================

/// Cancellation token of the queries it is passed to.
///
/// Clones share one flag, so a caller keeps a clone and hands the other to
/// the query. Queries run with a different handle are never affected.
/// Cancelling does not touch storage; the evaluation ends with
/// [`StoreError::Cancelled`] at its next check.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort every query running with this handle or a clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// MATERIALIZATION POLICIES
// =============================================================================

/// Decides which candidate triples a query emits.
pub(crate) trait Materialization {
    type Item;

    /// Whether triples found only in the snapshot can match.
    fn scans_snapshot(&self) -> bool;

    fn evaluate(
        &self,
        triple: Triple,
        in_snapshot: bool,
        history: Option<&TripleHistory>,
    ) -> Option<Self::Item>;
}

/// Triples present at one version.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AtVersion(pub Version);

impl Materialization for AtVersion {
    type Item = Triple;

    fn scans_snapshot(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        triple: Triple,
        in_snapshot: bool,
        history: Option<&TripleHistory>,
    ) -> Option<Triple> {
        let present = history.map_or(in_snapshot, |h| h.present_at(in_snapshot, self.0));
        present.then_some(triple)
    }
}

/// Triples whose presence differs between `start` and `end`, tagged with
/// their presence at `end`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Between {
    pub start: Version,
    pub end: Version,
}

impl Materialization for Between {
    type Item = (Triple, bool);

    fn scans_snapshot(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        triple: Triple,
        in_snapshot: bool,
        history: Option<&TripleHistory>,
    ) -> Option<(Triple, bool)> {
        let history = history?;
        let before = history.present_at(in_snapshot, self.start);
        let after = history.present_at(in_snapshot, self.end);
        (before != after).then_some((triple, after))
    }
}

/// Triples present at any version up to `max`, with those versions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AllVersions {
    pub max: Version,
}

impl Materialization for AllVersions {
    type Item = (Triple, Vec<Version>);

    fn scans_snapshot(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        triple: Triple,
        in_snapshot: bool,
        history: Option<&TripleHistory>,
    ) -> Option<(Triple, Vec<Version>)> {
        let versions = match history {
            Some(history) => history.versions_present(in_snapshot, self.max),
            None if in_snapshot => (0..=self.max).collect(),
            None => Vec::new(),
        };
        (!versions.is_empty()).then_some((triple, versions))
    }
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Lazy, forward-only result sequence of one query.
///
/// Yields `Err` at most once; the sequence ends after an error.
pub(crate) struct Evaluator<P: Materialization> {
    policy: P,
    order: IndexOrder,
    snapshot: Arc<Snapshot>,
    snapshot_next: usize,
    snapshot_end: usize,
    cursor: PatchCursor,
    page: VecDeque<(Key, TripleHistory)>,
    patch_done: bool,
    page_size: usize,
    cancel: CancelHandle,
    steps: usize,
    done: bool,
}

impl<P: Materialization> Evaluator<P> {
    pub fn new(
        policy: P,
        pattern: &EncodedPattern,
        snapshot: Arc<Snapshot>,
        txn: &ReadTransaction,
        page_size: usize,
        cancel: CancelHandle,
    ) -> Result<Self, StoreError> {
        let span = if policy.scans_snapshot() {
            snapshot.span(pattern)
        } else {
            0..0
        };
        let cursor = PatchCursor::open(txn, pattern)?;
        tracing::trace!(order = pattern.order().name(), snapshot_candidates = span.len(), "evaluator opened");
        Ok(Self {
            policy,
            order: pattern.order(),
            snapshot,
            snapshot_next: span.start,
            snapshot_end: span.end,
            cursor,
            page: VecDeque::new(),
            patch_done: false,
            page_size: page_size.max(1),
            cancel,
            steps: 0,
            done: false,
        })
    }

    fn refill(&mut self) -> Result<(), StoreError> {
        if self.page.is_empty() && !self.patch_done {
            self.cancel.check()?;
            let page = self.cursor.next_page(self.page_size)?;
            if page.is_empty() {
                self.patch_done = true;
            }
            self.page.extend(page);
        }
        Ok(())
    }

    fn take_snapshot(&mut self, key: Key) -> Triple {
        self.snapshot_next += 1;
        self.order.triple(key)
    }

    /// Next candidate in index order: the triple, its snapshot membership
    /// and its change history.
    fn next_candidate(&mut self) -> Result<Option<(Triple, bool, Option<TripleHistory>)>, StoreError> {
        self.refill()?;
        self.steps += 1;
        if self.steps % self.page_size == 0 {
            self.cancel.check()?;
        }

        let snapshot_key = (self.snapshot_next < self.snapshot_end)
            .then(|| self.snapshot.keys(self.order)[self.snapshot_next]);
        let patch_key = self.page.front().map(|(key, _)| *key);

        let candidate = match (snapshot_key, patch_key) {
            (None, None) => None,
            (Some(s), Some(p)) if s < p => Some((self.take_snapshot(s), true, None)),
            (Some(s), None) => Some((self.take_snapshot(s), true, None)),
            (Some(s), Some(p)) if s == p => {
                let triple = self.take_snapshot(s);
                let history = self.page.pop_front().map(|(_, h)| h);
                Some((triple, true, history))
            }
            (_, Some(_)) => {
                let Some((key, history)) = self.page.pop_front() else {
                    return Ok(None);
                };
                let triple = self.order.triple(key);
                // Snapshot keys were merged in already unless the policy skips them.
                let in_snapshot = !self.policy.scans_snapshot() && self.snapshot.contains(&triple);
                Some((triple, in_snapshot, Some(history)))
            }
        };
        Ok(candidate)
    }
}

impl<P: Materialization> Iterator for Evaluator<P> {
    type Item = Result<P::Item, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.next_candidate() {
                Ok(Some((triple, in_snapshot, history))) => {
                    if let Some(item) = self.policy.evaluate(triple, in_snapshot, history.as_ref()) {
                        return Some(Ok(item));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================
