//! # Version Controller
//!
//! Owns the version chain of one open store.
//!
//! The controller is the only writer. Appends are serialized by a mutex and
//! committed in a single redb write transaction; the in-memory state
//! (dictionary growth, snapshot, version statistics) is published only
//! after that commit succeeds. The version statistics double as the
//! published `maxVersion`, so a query either sees a version completely or
//! not at all.
//!
//! Queries never take the append mutex. They resolve their versions
//! against the published state, read through their own redb read
//! transaction, and hold the dictionary lock only to encode the pattern
//! and to decode the final page.

use crate::dictionary::{Dictionary, DictionaryStats};
use crate::evaluator::{AllVersions, AtVersion, Between, CancelHandle, Evaluator, Materialization};
use crate::formats::literal::{to_bracketed, validate_term};
use crate::index::EncodedPattern;
use crate::snapshot::Snapshot;
use crate::storage::patch_tree::{self, PatchSummary};
use crate::storage::{self, DICTIONARY, SNAPSHOT, VERSION_STATS};
use crate::types::{serialization_err, storage_err};
use crate::{
    Count, DeltaTriple, EncodedElement, PatchElement, Role, SearchResult, StoreError,
    StoreOptions, TermTriple, TriplePattern, Version, VersionStats, VersionedTriple,
};
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// Outcome of [`Controller::append_or_recover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The version was new and has been committed with this many elements.
    Committed(usize),
    /// The version already existed; its stored patch holds this many elements.
    Recovered(usize),
}

impl AppendOutcome {
    /// Number of elements committed or found.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            AppendOutcome::Committed(n) | AppendOutcome::Recovered(n) => n,
        }
    }
}

/// Whether caller input is already in SPO order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputOrder {
    Unsorted,
    Sorted,
}

/// One materialized page plus how far counting got.
struct Page<T> {
    items: Vec<T>,
    matched: u64,
    exhausted: bool,
}

pub(crate) struct Controller {
    db: Database,
    options: StoreOptions,
    dictionary: RwLock<Dictionary>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    versions: RwLock<Vec<VersionStats>>,
    append_lock: Mutex<()>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("options", &self.options)
            .field("max_version", &self.max_version())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Open the database file and load the published state.
    pub fn open(file: &Path, options: StoreOptions, create: bool) -> Result<Self, StoreError> {
        let db = storage::open_database(file, create)?;

        let (dictionary, versions, snapshot) = {
            let read_txn = db.begin_read().map_err(storage_err)?;
            let dictionary = {
                let table = read_txn.open_table(DICTIONARY).map_err(storage_err)?;
                Dictionary::load(&table)?
            };
            let versions = load_versions(&read_txn)?;
            let snapshot = if versions.is_empty() {
                None
            } else {
                let table = read_txn.open_table(SNAPSHOT).map_err(storage_err)?;
                Some(Arc::new(Snapshot::load(&table)?))
            };
            (dictionary, versions, snapshot)
        };

        tracing::info!(
            path = %file.display(),
            max_version = versions.len() as i64 - 1,
            terms = dictionary.len(),
            read_only = options.read_only,
            "store opened"
        );

        Ok(Self {
            db,
            options,
            dictionary: RwLock::new(dictionary),
            snapshot: RwLock::new(snapshot),
            versions: RwLock::new(versions),
            append_lock: Mutex::new(()),
        })
    }

    // =========================================================================
    // VERSION STATE
    // =========================================================================

    /// Highest published version, -1 for an empty store.
    pub fn max_version(&self) -> i64 {
        read(&self.versions).map_or(-1, |v| v.len() as i64 - 1)
    }

    /// Resolve a requested version; `None` means the latest.
    pub fn resolve_version(&self, requested: Option<Version>) -> Result<Version, StoreError> {
        let latest = self.latest()?;
        match requested {
            None => Ok(latest),
            Some(v) if v <= latest => Ok(v),
            Some(v) => Err(StoreError::NotFound(format!(
                "version {} (latest is {})",
                v, latest
            ))),
        }
    }

    fn latest(&self) -> Result<Version, StoreError> {
        let versions = read(&self.versions)?;
        match versions.len() {
            0 => Err(StoreError::InvalidArgument("store has no versions".to_string())),
            n => Ok((n - 1) as Version),
        }
    }

    pub fn version_stats(&self) -> Result<Vec<VersionStats>, StoreError> {
        Ok(read(&self.versions)?.clone())
    }

    pub fn dictionary_stats(&self) -> Result<DictionaryStats, StoreError> {
        Ok(read(&self.dictionary)?.stats())
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>, StoreError> {
        read(&self.snapshot)?
            .clone()
            .ok_or_else(|| StoreError::InvalidArgument("store has no versions".to_string()))
    }

    // =========================================================================
    // APPEND
    // =========================================================================

    /// Commit `elements` as `version` (`None` = next version).
    ///
    /// Returns the number of stored elements.
    pub fn append(
        &self,
        elements: Vec<PatchElement>,
        version: Option<Version>,
        order: InputOrder,
    ) -> Result<usize, StoreError> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StoreError::StorageFailure("append lock poisoned".to_string()))?;
        self.commit(elements, version, order)
    }

    /// Commit `version` unless it already exists, in which case its stored
    /// patch is loaded instead.
    pub fn append_or_recover(
        &self,
        elements: Vec<PatchElement>,
        version: Version,
    ) -> Result<AppendOutcome, StoreError> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StoreError::StorageFailure("append lock poisoned".to_string()))?;
        if i64::from(version) <= self.max_version() {
            let existing = self.load_patch(version)?.len();
            tracing::debug!(version, elements = existing, "version already committed, loading instead");
            return Ok(AppendOutcome::Recovered(existing));
        }
        self.commit(elements, Some(version), InputOrder::Unsorted)
            .map(AppendOutcome::Committed)
    }

    /// Append body; the append mutex must be held.
    fn commit(
        &self,
        elements: Vec<PatchElement>,
        version: Option<Version>,
        order: InputOrder,
    ) -> Result<usize, StoreError> {
        if self.options.read_only {
            return Err(StoreError::InvalidArgument(
                "store is opened read-only".to_string(),
            ));
        }
        let next = self.max_version() + 1;
        let version = version.unwrap_or(next as Version);
        if i64::from(version) != next {
            return Err(if i64::from(version) < next {
                StoreError::Conflict(format!("version {} is already committed", version))
            } else {
                StoreError::Conflict(format!(
                    "version {} cannot be appended, next version is {}",
                    version, next
                ))
            });
        }
        if version == 0 && elements.iter().any(|e| !e.addition) {
            return Err(StoreError::InvalidArgument(
                "All triples of the initial snapshot MUST be additions".to_string(),
            ));
        }

        let elements = prepare_elements(elements, order)?;
        let started = Instant::now();
        let inserted = if version == 0 {
            self.commit_snapshot(elements)?
        } else {
            self.commit_patch(version, elements)?
        };
        tracing::info!(
            version,
            elements = inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "version committed"
        );
        Ok(inserted)
    }

    fn commit_snapshot(&self, elements: Vec<PatchElement>) -> Result<usize, StoreError> {
        let triples: Vec<TermTriple> = elements.into_iter().map(|e| e.triple).collect();
        let dictionary = Dictionary::build_base(&triples);
        let encoded = triples
            .iter()
            .map(|t| {
                dictionary.lookup_triple(t).ok_or_else(|| {
                    StoreError::InvalidArgument(format!("cannot encode snapshot triple {}", t))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let snapshot = Snapshot::build(encoded)?;
        let stats = VersionStats {
            additions: snapshot.len() as u64,
            deletions: 0,
            live_triples: snapshot.len() as u64,
            new_terms: dictionary.len() as u64,
        };

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let blocks = {
            let mut dict_table = write_txn.open_table(DICTIONARY).map_err(storage_err)?;
            dictionary.persist_base(&mut dict_table)?;
            let mut snapshot_table = write_txn.open_table(SNAPSHOT).map_err(storage_err)?;
            let blocks = snapshot.persist(&mut snapshot_table, self.options.snapshot_block_size)?;
            write_stats(&write_txn, 0, &stats)?;
            blocks
        };
        write_txn.commit().map_err(storage_err)?;

        // Update in-memory state only after successful commit.
        let inserted = snapshot.len();
        *write(&self.dictionary)? = dictionary;
        *write(&self.snapshot)? = Some(Arc::new(snapshot));
        write(&self.versions)?.push(stats);
        tracing::debug!(triples = inserted, blocks, "snapshot built");
        Ok(inserted)
    }

    fn commit_patch(&self, version: Version, elements: Vec<PatchElement>) -> Result<usize, StoreError> {
        let snapshot = self.snapshot()?;
        let previous = read(&self.versions)?
            .last()
            .copied()
            .ok_or_else(|| StoreError::InvalidArgument("store has no versions".to_string()))?;

        let (encoded, new_terms) = {
            let dictionary = read(&self.dictionary)?;
            let mut allocator = dictionary.allocator();
            let encoded: Vec<EncodedElement> = elements
                .iter()
                .map(|e| EncodedElement {
                    triple: allocator.encode_triple(&e.triple),
                    addition: e.addition,
                })
                .collect();
            (encoded, allocator.finish())
        };

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let summary: PatchSummary = patch_tree::write_patch(&write_txn, version, &encoded, &snapshot)?;
        let stats = VersionStats {
            additions: summary.additions,
            deletions: summary.deletions,
            live_triples: (previous.live_triples + summary.effective_additions)
                .saturating_sub(summary.effective_deletions),
            new_terms: new_terms.len() as u64,
        };
        {
            let mut dict_table = write_txn.open_table(DICTIONARY).map_err(storage_err)?;
            new_terms.persist(&mut dict_table)?;
        }
        write_stats(&write_txn, version, &stats)?;
        write_txn.commit().map_err(storage_err)?;

        // Update in-memory state only after successful commit.
        write(&self.dictionary)?.apply(new_terms)?;
        write(&self.versions)?.push(stats);

        if summary.no_ops() > 0 {
            tracing::warn!(
                version,
                no_ops = summary.no_ops(),
                "patch restates the current state of some triples"
            );
        }
        Ok(encoded.len())
    }

    /// The elements committed at `version`; version 0 yields the snapshot
    /// as additions.
    pub fn load_patch(&self, version: Version) -> Result<Vec<PatchElement>, StoreError> {
        let version = self.resolve_version(Some(version))?;
        if version == 0 {
            let snapshot = self.snapshot()?;
            let dictionary = read(&self.dictionary)?;
            return snapshot
                .triples()
                .map(|t| {
                    Ok(PatchElement {
                        triple: dictionary.decode_triple(t)?,
                        addition: true,
                    })
                })
                .collect();
        }
        let encoded = {
            let read_txn = self.db.begin_read().map_err(storage_err)?;
            patch_tree::load_patch(&read_txn, version)?
        };
        let dictionary = read(&self.dictionary)?;
        encoded
            .into_iter()
            .map(|e| {
                Ok(PatchElement {
                    triple: dictionary.decode_triple(e.triple)?,
                    addition: e.addition,
                })
            })
            .collect()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Validate and encode a pattern.
    ///
    /// `Ok(None)` means a bound term is unknown to the dictionary.
    fn encode_pattern(&self, pattern: &TriplePattern) -> Result<Option<EncodedPattern>, StoreError> {
        let mut internal = TriplePattern::any();
        for role in Role::ALL {
            if let Some(term) = pattern.term(role) {
                validate_term(term, role)?;
                let term = to_bracketed(term).into_owned();
                internal = match role {
                    Role::Subject => internal.with_subject(term),
                    Role::Predicate => internal.with_predicate(term),
                    Role::Object => internal.with_object(term),
                };
            }
        }
        Ok(read(&self.dictionary)?.encode_pattern(&internal))
    }

    fn evaluator<P: Materialization>(
        &self,
        policy: P,
        pattern: &EncodedPattern,
        txn: &ReadTransaction,
        cancel: &CancelHandle,
    ) -> Result<Evaluator<P>, StoreError> {
        Evaluator::new(
            policy,
            pattern,
            self.snapshot()?,
            txn,
            self.options.page_size,
            cancel.clone(),
        )
    }

    fn delta_range(&self, start: Version, end: Option<Version>) -> Result<(Version, Version), StoreError> {
        let latest = self.latest()?;
        let end = end.unwrap_or(latest);
        if start >= end {
            return Err(StoreError::InvalidArgument(format!(
                "start version {} must be smaller than end version {}",
                start, end
            )));
        }
        if end > latest {
            return Err(StoreError::NotFound(format!(
                "version {} (latest is {})",
                end, latest
            )));
        }
        Ok((start, end))
    }

    pub fn search_version_materialized(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        version: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<TermTriple>, StoreError> {
        let version = self.resolve_version(version)?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(unknown_term_result());
        };
        tracing::debug!(mode = "vm", version, order = encoded.order().name(), offset, limit, "query");

        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(AtVersion(version), &encoded, &txn, cancel)?;
        let page = collect_page(evaluator, offset, limit, self.options.exact_count_limit)?;
        let count = self.vm_count(&page, &encoded, version, &txn)?;

        let dictionary = read(&self.dictionary)?;
        let items = page
            .items
            .into_iter()
            .map(|t| dictionary.decode_triple(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(with_count(items, count))
    }

    pub fn count_version_materialized(
        &self,
        pattern: &TriplePattern,
        version: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        let version = self.resolve_version(version)?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(Count::estimate(0));
        };
        if encoded.is_wildcard() {
            return Ok(Count::exact(self.live_triples(version)?));
        }
        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(AtVersion(version), &encoded, &txn, cancel)?;
        let page = count_matches(evaluator, self.options.exact_count_limit)?;
        self.vm_count(&page, &encoded, version, &txn)
    }

    fn vm_count<T>(
        &self,
        page: &Page<T>,
        encoded: &EncodedPattern,
        version: Version,
        txn: &ReadTransaction,
    ) -> Result<Count, StoreError> {
        if page.exhausted {
            return Ok(Count::exact(page.matched));
        }
        if encoded.is_wildcard() {
            return Ok(Count::exact(self.live_triples(version)?));
        }
        let upper = self.snapshot()?.count(encoded) as u64 + patch_tree::count_entries(txn, encoded)?;
        Ok(Count::estimate(upper.max(page.matched)))
    }

    fn live_triples(&self, version: Version) -> Result<u64, StoreError> {
        read(&self.versions)?
            .get(version as usize)
            .map(|s| s.live_triples)
            .ok_or_else(|| StoreError::NotFound(format!("version {}", version)))
    }

    pub fn search_delta_materialized(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        start: Version,
        end: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<DeltaTriple>, StoreError> {
        let (start, end) = self.delta_range(start, end)?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(unknown_term_result());
        };
        tracing::debug!(mode = "dm", start, end, order = encoded.order().name(), offset, limit, "query");

        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(Between { start, end }, &encoded, &txn, cancel)?;
        let page = collect_page(evaluator, offset, limit, self.options.exact_count_limit)?;
        let count = dm_count(&page, &encoded, &txn)?;

        let dictionary = read(&self.dictionary)?;
        let items = page
            .items
            .into_iter()
            .map(|(t, addition)| {
                Ok(DeltaTriple {
                    triple: dictionary.decode_triple(t)?,
                    addition,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(with_count(items, count))
    }

    pub fn count_delta_materialized(
        &self,
        pattern: &TriplePattern,
        start: Version,
        end: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        let (start, end) = self.delta_range(start, end)?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(Count::estimate(0));
        };
        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(Between { start, end }, &encoded, &txn, cancel)?;
        let page = count_matches(evaluator, self.options.exact_count_limit)?;
        dm_count(&page, &encoded, &txn)
    }

    pub fn search_version(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<VersionedTriple>, StoreError> {
        let max = self.latest()?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(unknown_term_result());
        };
        tracing::debug!(mode = "v", max, order = encoded.order().name(), offset, limit, "query");

        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(AllVersions { max }, &encoded, &txn, cancel)?;
        let page = collect_page(evaluator, offset, limit, self.options.exact_count_limit)?;
        let count = self.vi_count(&page, &encoded, &txn)?;

        let dictionary = read(&self.dictionary)?;
        let items = page
            .items
            .into_iter()
            .map(|(t, versions)| {
                Ok(VersionedTriple {
                    triple: dictionary.decode_triple(t)?,
                    versions,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(with_count(items, count))
    }

    pub fn count_version(
        &self,
        pattern: &TriplePattern,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        let max = self.latest()?;
        let Some(encoded) = self.encode_pattern(pattern)? else {
            return Ok(Count::estimate(0));
        };
        let txn = self.db.begin_read().map_err(storage_err)?;
        let evaluator = self.evaluator(AllVersions { max }, &encoded, &txn, cancel)?;
        let page = count_matches(evaluator, self.options.exact_count_limit)?;
        self.vi_count(&page, &encoded, &txn)
    }

    fn vi_count<T>(
        &self,
        page: &Page<T>,
        encoded: &EncodedPattern,
        txn: &ReadTransaction,
    ) -> Result<Count, StoreError> {
        if page.exhausted {
            return Ok(Count::exact(page.matched));
        }
        let upper = self.snapshot()?.count(encoded) as u64 + patch_tree::count_entries(txn, encoded)?;
        Ok(Count::estimate(upper.max(page.matched)))
    }

}

// =============================================================================
// HELPERS
// =============================================================================

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::StorageFailure("store state lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::StorageFailure("store state lock poisoned".to_string()))
}

fn load_versions(txn: &ReadTransaction) -> Result<Vec<VersionStats>, StoreError> {
    let table = txn.open_table(VERSION_STATS).map_err(storage_err)?;
    let mut versions = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (key, value) = entry.map_err(storage_err)?;
        if key.value() as usize != versions.len() {
            return Err(StoreError::Serialization(format!(
                "Version chain gap: found version {} after {} versions",
                key.value(),
                versions.len()
            )));
        }
        versions.push(postcard::from_bytes(value.value()).map_err(serialization_err)?);
    }
    Ok(versions)
}

fn write_stats(
    txn: &redb::WriteTransaction,
    version: Version,
    stats: &VersionStats,
) -> Result<(), StoreError> {
    let bytes = postcard::to_allocvec(stats).map_err(serialization_err)?;
    let mut table = txn.open_table(VERSION_STATS).map_err(storage_err)?;
    table.insert(version, bytes.as_slice()).map_err(storage_err)?;
    Ok(())
}

/// Validate, order and canonicalize caller elements.
fn prepare_elements(
    mut elements: Vec<PatchElement>,
    order: InputOrder,
) -> Result<Vec<PatchElement>, StoreError> {
    match order {
        InputOrder::Unsorted => elements.sort_by(|a, b| a.triple.cmp(&b.triple)),
        InputOrder::Sorted => {
            if let Some(window) = elements.windows(2).find(|w| w[0].triple > w[1].triple) {
                return Err(StoreError::InvalidArgument(format!(
                    "elements are not sorted: {} precedes {}",
                    window[0].triple, window[1].triple
                )));
            }
        }
    }

    let mut prepared = Vec::with_capacity(elements.len());
    for element in elements {
        for role in Role::ALL {
            validate_term(element.triple.term(role), role)?;
        }
        let triple = TermTriple::new(
            to_bracketed(&element.triple.subject),
            to_bracketed(&element.triple.predicate),
            to_bracketed(&element.triple.object),
        );
        prepared.push(PatchElement {
            triple,
            addition: element.addition,
        });
    }

    let mut seen = BTreeSet::new();
    for element in &prepared {
        if !seen.insert(&element.triple) {
            return Err(StoreError::InvalidArgument(format!(
                "triple occurs more than once in one version: {}",
                element.triple
            )));
        }
    }
    Ok(prepared)
}

/// Skip `offset` matches, keep `limit` (0 = all), then keep counting up
/// to `exact_limit` matches.
fn collect_page<T, I>(
    mut matches: I,
    offset: usize,
    limit: usize,
    exact_limit: usize,
) -> Result<Page<T>, StoreError>
where
    I: Iterator<Item = Result<T, StoreError>>,
{
    let end = if limit == 0 {
        usize::MAX
    } else {
        offset.saturating_add(limit)
    };
    let stop = end.max(exact_limit);
    let mut items = Vec::new();
    let mut matched = 0usize;
    while matched < stop {
        match matches.next() {
            None => {
                return Ok(Page {
                    items,
                    matched: matched as u64,
                    exhausted: true,
                });
            }
            Some(item) => {
                let item = item?;
                if matched >= offset && matched < end {
                    items.push(item);
                }
                matched += 1;
            }
        }
    }
    Ok(Page {
        items,
        matched: matched as u64,
        exhausted: is_exhausted(&mut matches)?,
    })
}

/// Count up to `exact_limit` matches without keeping any.
fn count_matches<T, I>(mut matches: I, exact_limit: usize) -> Result<Page<T>, StoreError>
where
    I: Iterator<Item = Result<T, StoreError>>,
{
    let mut matched = 0usize;
    while matched < exact_limit {
        match matches.next() {
            None => {
                return Ok(Page {
                    items: Vec::new(),
                    matched: matched as u64,
                    exhausted: true,
                });
            }
            Some(item) => {
                item?;
                matched += 1;
            }
        }
    }
    Ok(Page {
        items: Vec::new(),
        matched: matched as u64,
        exhausted: is_exhausted(&mut matches)?,
    })
}

/// Peek one match past the counting limit.
fn is_exhausted<T, I>(matches: &mut I) -> Result<bool, StoreError>
where
    I: Iterator<Item = Result<T, StoreError>>,
{
    match matches.next() {
        None => Ok(true),
        Some(item) => item.map(|_| false),
    }
}

fn dm_count<T>(
    page: &Page<T>,
    encoded: &EncodedPattern,
    txn: &ReadTransaction,
) -> Result<Count, StoreError> {
    if page.exhausted {
        return Ok(Count::exact(page.matched));
    }
    let upper = patch_tree::count_entries(txn, encoded)?;
    Ok(Count::estimate(upper.max(page.matched)))
}

fn unknown_term_result<T>() -> SearchResult<T> {
    SearchResult {
        items: Vec::new(),
        total_count: 0,
        has_exact_count: false,
    }
}

fn with_count<T>(items: Vec<T>, count: Count) -> SearchResult<T> {
    SearchResult {
        items,
        total_count: count.total_count,
        has_exact_count: count.has_exact_count,
    }
}

// =============================================================================
// TESTS
// =============================================================================
