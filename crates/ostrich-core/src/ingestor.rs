//! # Ingestor Module
//!
//! Bulk import of a versioned dataset laid out on disk.
//!
//! - One sub-directory per version, named by its decimal number
//! - `*.nt.additions.txt` files hold additions, `*.nt.deletions.txt` deletions
//! - Version 0 reads addition files only
//! - Versions already in the store are skipped, so an interrupted import resumes

use crate::controller::AppendOutcome;
use crate::formats::parse_line;
use crate::store::OstrichStore;
use crate::types::storage_err;
use crate::{PatchElement, StoreError, Version};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const ADDITIONS_SUFFIX: &str = ".nt.additions.txt";
const DELETIONS_SUFFIX: &str = ".nt.deletions.txt";

/// What happened to one version during an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReport {
    pub version: Version,
    /// Elements committed, or found in the store when skipped.
    pub elements: usize,
    /// The version was already committed and left untouched.
    pub skipped: bool,
    pub duration: Duration,
}

/// Result of [`Ingestor::ingest_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub versions: Vec<VersionReport>,
}

impl ImportReport {
    /// Versions that were newly committed.
    pub fn imported(&self) -> impl Iterator<Item = &VersionReport> {
        self.versions.iter().filter(|v| !v.skipped)
    }
}

/// The Ingestor reads version directories and appends them to a store.
pub struct Ingestor;

impl Ingestor {
    /// Import every version directory under `dir`, in numeric order.
    ///
    /// Entries whose name is not a version number are ignored. A missing
    /// version in the sequence surfaces as the `Conflict` of the append
    /// that follows it.
    pub fn ingest_directory(
        store: &OstrichStore,
        dir: impl AsRef<Path>,
    ) -> Result<ImportReport, StoreError> {
        let dir = dir.as_ref();
        let versions = Self::version_directories(dir)?;
        let mut report = ImportReport::default();

        for (version, path) in versions {
            let started = Instant::now();
            let outcome = if i64::from(version) <= store.max_version()? {
                store.append_or_recover(Vec::new(), version)?
            } else {
                let elements = Self::read_version(&path, version)?;
                store.append_or_recover(elements, version)?
            };
            let duration = started.elapsed();
            let skipped = matches!(outcome, AppendOutcome::Recovered(_));
            tracing::info!(
                version,
                elements = outcome.count(),
                skipped,
                elapsed_ms = duration.as_millis() as u64,
                "version imported"
            );
            report.versions.push(VersionReport {
                version,
                elements: outcome.count(),
                skipped,
                duration,
            });
        }
        Ok(report)
    }

    /// Numbered sub-directories of `dir`, sorted by version.
    fn version_directories(dir: &Path) -> Result<Vec<(Version, PathBuf)>, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::InvalidArgument(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(storage_err)? {
            let entry = entry.map_err(storage_err)?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.parse::<Version>().ok()) {
                Some(version) => versions.push((version, path)),
                None => tracing::debug!(entry = %path.display(), "skipping non-version entry"),
            }
        }
        versions.sort_unstable_by_key(|(version, _)| *version);
        Ok(versions)
    }

    /// Read all patch files of one version directory.
    pub fn read_version(dir: &Path, version: Version) -> Result<Vec<PatchElement>, StoreError> {
        let mut files: Vec<(PathBuf, bool)> = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(storage_err)? {
            let path = entry.map_err(storage_err)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(ADDITIONS_SUFFIX) {
                files.push((path, true));
            } else if name.ends_with(DELETIONS_SUFFIX) && version > 0 {
                files.push((path, false));
            }
        }
        files.sort();

        let mut elements = Vec::new();
        for (path, addition) in files {
            Self::read_patch_file(&path, addition, &mut elements)?;
        }
        Ok(elements)
    }

    /// Parse one N-Triples file, tagging every triple as addition or deletion.
    pub fn read_patch_file(
        path: &Path,
        addition: bool,
        out: &mut Vec<PatchElement>,
    ) -> Result<(), StoreError> {
        let text = std::fs::read_to_string(path).map_err(storage_err)?;
        for (index, line) in text.lines().enumerate() {
            let parsed = parse_line(line, index + 1).map_err(|e| match e {
                StoreError::InvalidArgument(reason) => {
                    StoreError::InvalidArgument(format!("{}: {}", path.display(), reason))
                }
                other => other,
            })?;
            if let Some(triple) = parsed {
                out.push(PatchElement { triple, addition });
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
