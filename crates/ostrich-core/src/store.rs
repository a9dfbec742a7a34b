//! # Store Handle
//!
//! [`OstrichStore`] is the explicit handle callers open, query and close.
//! There is no process-wide registry: each handle owns its controller, and
//! two handles never share state.
//!
//! A store is a directory holding one redb file. Once closed, every
//! operation on the handle fails with [`StoreError::Closed`]; closing again
//! is a no-op.

use crate::controller::{AppendOutcome, Controller, InputOrder};
use crate::dictionary::DictionaryStats;
use crate::evaluator::CancelHandle;
use crate::primitives::STORE_FILE_NAME;
use crate::types::storage_err;
use crate::{
    Count, DeltaTriple, PatchElement, SearchResult, StoreError, StoreOptions, TermTriple,
    TriplePattern, Version, VersionStats, VersionedTriple,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// How often `close(remove = true)` checks whether running queries are done.
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Operations a handle supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub search_version_materialized: bool,
    pub count_version_materialized: bool,
    pub search_delta_materialized: bool,
    pub count_delta_materialized: bool,
    pub search_version: bool,
    pub count_version: bool,
    pub append: bool,
}

/// Summary of a store's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub max_version: i64,
    pub snapshot_triples: u64,
    pub latest_triples: u64,
    /// Distinct triples across all versions.
    pub distinct_triples: Count,
    pub dictionary: DictionaryStats,
    pub versions: Vec<VersionStats>,
}

/// Handle to one versioned triple store.
#[derive(Debug)]
pub struct OstrichStore {
    path: PathBuf,
    options: StoreOptions,
    inner: RwLock<Option<Arc<Controller>>>,
}

impl OstrichStore {
    /// Open the store in directory `path`.
    ///
    /// A writable open creates the directory and database if missing. A
    /// read-only open requires an existing store.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref();
        options.validate()?;
        if path.as_os_str().is_empty() {
            return Err(StoreError::InvalidArgument("store path is empty".to_string()));
        }
        if path.is_file() {
            return Err(StoreError::InvalidArgument(format!(
                "store path {} is a file, expected a directory",
                path.display()
            )));
        }
        let file = path.join(STORE_FILE_NAME);
        if options.read_only {
            if !file.is_file() {
                return Err(StoreError::InvalidArgument(format!(
                    "no store found at {}",
                    path.display()
                )));
            }
        } else {
            std::fs::create_dir_all(path).map_err(|e| {
                StoreError::InvalidArgument(format!("cannot create {}: {}", path.display(), e))
            })?;
        }

        let controller = Controller::open(&file, options.clone(), !options.read_only)?;
        Ok(Self {
            path: path.to_path_buf(),
            options,
            inner: RwLock::new(Some(Arc::new(controller))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn controller(&self) -> Result<Arc<Controller>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::StorageFailure("store handle lock poisoned".to_string()))?
            .clone()
            .ok_or(StoreError::Closed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().map_or(true, |inner| inner.is_none())
    }

    /// Release the store; with `remove`, also delete its directory.
    ///
    /// New operations fail with [`StoreError::Closed`] at once. Queries
    /// already running keep the database open until they finish; `remove`
    /// waits for them before deleting anything. Closing a closed handle
    /// does nothing.
    pub fn close(&self, remove: bool) -> Result<(), StoreError> {
        let controller = self
            .inner
            .write()
            .map_err(|_| StoreError::StorageFailure("store handle lock poisoned".to_string()))?
            .take();
        let Some(controller) = controller else {
            return Ok(());
        };
        if remove {
            release(controller);
        } else {
            drop(controller);
        }
        tracing::info!(path = %self.path.display(), remove, "store closed");

        if remove {
            std::fs::remove_dir_all(&self.path).map_err(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove store directory");
                storage_err(e)
            })?;
        }
        Ok(())
    }

    /// Highest committed version, -1 if the store is empty.
    pub fn max_version(&self) -> Result<i64, StoreError> {
        Ok(self.controller()?.max_version())
    }

    pub fn features(&self) -> Result<Features, StoreError> {
        self.controller()?;
        Ok(Features {
            search_version_materialized: true,
            count_version_materialized: true,
            search_delta_materialized: true,
            count_delta_materialized: true,
            search_version: true,
            count_version: true,
            append: !self.options.read_only,
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================
    //
    // Each query has a `*_with_cancel` form taking the caller's
    // [`CancelHandle`]; the plain form runs uncancellable.

    /// Triples matching `pattern` at `version` (`None` = latest).
    ///
    /// `offset` matches are skipped and at most `limit` returned; a `limit`
    /// of 0 returns every match.
    pub fn search_version_materialized(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        version: Option<Version>,
    ) -> Result<SearchResult<TermTriple>, StoreError> {
        self.search_version_materialized_with_cancel(
            pattern,
            offset,
            limit,
            version,
            &CancelHandle::new(),
        )
    }

    pub fn search_version_materialized_with_cancel(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        version: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<TermTriple>, StoreError> {
        self.controller()?
            .search_version_materialized(pattern, offset, limit, version, cancel)
    }

    pub fn count_version_materialized(
        &self,
        pattern: &TriplePattern,
        version: Option<Version>,
    ) -> Result<Count, StoreError> {
        self.count_version_materialized_with_cancel(pattern, version, &CancelHandle::new())
    }

    pub fn count_version_materialized_with_cancel(
        &self,
        pattern: &TriplePattern,
        version: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        self.controller()?
            .count_version_materialized(pattern, version, cancel)
    }

    /// Triples whose presence differs between `start` and `end`
    /// (`None` = latest), tagged with their direction.
    pub fn search_delta_materialized(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        start: Version,
        end: Option<Version>,
    ) -> Result<SearchResult<DeltaTriple>, StoreError> {
        self.search_delta_materialized_with_cancel(
            pattern,
            offset,
            limit,
            start,
            end,
            &CancelHandle::new(),
        )
    }

    pub fn search_delta_materialized_with_cancel(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        start: Version,
        end: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<DeltaTriple>, StoreError> {
        self.controller()?
            .search_delta_materialized(pattern, offset, limit, start, end, cancel)
    }

    pub fn count_delta_materialized(
        &self,
        pattern: &TriplePattern,
        start: Version,
        end: Option<Version>,
    ) -> Result<Count, StoreError> {
        self.count_delta_materialized_with_cancel(pattern, start, end, &CancelHandle::new())
    }

    pub fn count_delta_materialized_with_cancel(
        &self,
        pattern: &TriplePattern,
        start: Version,
        end: Option<Version>,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        self.controller()?
            .count_delta_materialized(pattern, start, end, cancel)
    }

    /// Triples matching `pattern` in any version, each with its versions.
    pub fn search_version(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResult<VersionedTriple>, StoreError> {
        self.search_version_with_cancel(pattern, offset, limit, &CancelHandle::new())
    }

    pub fn search_version_with_cancel(
        &self,
        pattern: &TriplePattern,
        offset: usize,
        limit: usize,
        cancel: &CancelHandle,
    ) -> Result<SearchResult<VersionedTriple>, StoreError> {
        self.controller()?.search_version(pattern, offset, limit, cancel)
    }

    pub fn count_version(&self, pattern: &TriplePattern) -> Result<Count, StoreError> {
        self.count_version_with_cancel(pattern, &CancelHandle::new())
    }

    pub fn count_version_with_cancel(
        &self,
        pattern: &TriplePattern,
        cancel: &CancelHandle,
    ) -> Result<Count, StoreError> {
        self.controller()?.count_version(pattern, cancel)
    }

    // =========================================================================
    // APPEND
    // =========================================================================

    /// Commit `elements` as `version` (`None` = next version).
    ///
    /// Elements are sorted first. Version 0 must consist of additions only.
    pub fn append(
        &self,
        elements: Vec<PatchElement>,
        version: Option<Version>,
    ) -> Result<usize, StoreError> {
        self.controller()?
            .append(elements, version, InputOrder::Unsorted)
    }

    /// Like [`append`](Self::append) for elements already in SPO order.
    pub fn append_sorted(
        &self,
        elements: Vec<PatchElement>,
        version: Option<Version>,
    ) -> Result<usize, StoreError> {
        self.controller()?.append(elements, version, InputOrder::Sorted)
    }

    /// Commit `version`, or load it if it is already committed.
    ///
    /// `elements` are ignored for an existing version.
    pub fn append_or_recover(
        &self,
        elements: Vec<PatchElement>,
        version: Version,
    ) -> Result<AppendOutcome, StoreError> {
        self.controller()?.append_or_recover(elements, version)
    }

    /// The elements committed at `version`.
    pub fn patch(&self, version: Version) -> Result<Vec<PatchElement>, StoreError> {
        self.controller()?.load_patch(version)
    }

    pub fn metadata(&self) -> Result<StoreMetadata, StoreError> {
        let controller = self.controller()?;
        let versions = controller.version_stats()?;
        let distinct_triples = if versions.is_empty() {
            Count::exact(0)
        } else {
            controller.count_version(&TriplePattern::any(), &CancelHandle::new())?
        };
        Ok(StoreMetadata {
            max_version: versions.len() as i64 - 1,
            snapshot_triples: versions.first().map_or(0, |v| v.live_triples),
            latest_triples: versions.last().map_or(0, |v| v.live_triples),
            distinct_triples,
            dictionary: controller.dictionary_stats()?,
            versions,
        })
    }
}

/// Drop the last reference to `controller`, waiting for in-flight queries
/// that still hold clones. The database file is closed on return.
fn release(mut controller: Arc<Controller>) {
    let mut waited = false;
    loop {
        match Arc::try_unwrap(controller) {
            Ok(owned) => {
                drop(owned);
                return;
            }
            Err(shared) => {
                if !waited {
                    tracing::debug!(
                        queries = Arc::strong_count(&shared) - 1,
                        "waiting for running queries before removing store"
                    );
                    waited = true;
                }
                controller = shared;
                std::thread::sleep(RELEASE_POLL_INTERVAL);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
