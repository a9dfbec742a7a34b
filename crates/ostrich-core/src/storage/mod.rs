//! # Durable Storage
//!
//! One redb database per store holds every durable structure:
//!
//! | table            | key                     | value                  |
//! |------------------|-------------------------|------------------------|
//! | `dictionary`     | (section, id)           | term                   |
//! | `snapshot`       | (order, block)          | compressed key block   |
//! | `patch_spo`      | (s, p, o)               | postcard change list   |
//! | `patch_pos`      | (p, o, s)               | -                      |
//! | `patch_osp`      | (o, s, p)               | -                      |
//! | `patch_versions` | (version, s, p, o)      | addition flag          |
//! | `version_stats`  | version                 | postcard statistics    |
//! | `metadata`       | name                    | u64                    |
//!
//! A version is committed in exactly one write transaction, so a crash
//! leaves either the whole version or none of it.

pub(crate) mod patch_tree;

use crate::primitives::FORMAT_VERSION;
use crate::types::storage_err;
use crate::StoreError;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::Path;

// =============================================================================
// TABLE DEFINITIONS
// =============================================================================

/// Dictionary entries: (section tag, identifier) -> term entry.
pub(crate) const DICTIONARY: TableDefinition<(u8, u64), &str> =
    TableDefinition::new("dictionary");

/// Snapshot blocks: (index order tag, block number) -> encoded block.
pub(crate) const SNAPSHOT: TableDefinition<(u8, u64), &[u8]> = TableDefinition::new("snapshot");

/// Patch tree in SPO order, carrying each triple's change list.
pub(crate) const PATCH_SPO: TableDefinition<(u64, u64, u64), &[u8]> =
    TableDefinition::new("patch_spo");

/// Patch tree keys in POS order.
pub(crate) const PATCH_POS: TableDefinition<(u64, u64, u64), ()> =
    TableDefinition::new("patch_pos");

/// Patch tree keys in OSP order.
pub(crate) const PATCH_OSP: TableDefinition<(u64, u64, u64), ()> =
    TableDefinition::new("patch_osp");

/// Per-version patch contents: (version, s, p, o) -> addition.
pub(crate) const PATCH_VERSIONS: TableDefinition<(u32, u64, u64, u64), bool> =
    TableDefinition::new("patch_versions");

/// Per-version statistics.
pub(crate) const VERSION_STATS: TableDefinition<u32, &[u8]> =
    TableDefinition::new("version_stats");

/// Store-level counters.
pub(crate) const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const FORMAT_KEY: &str = "format_version";

// =============================================================================
// DATABASE LIFECYCLE
// =============================================================================

/// Open (or create) the database file and make sure every table exists.
///
/// Fails with a serialization error if the file was written by a different
/// format version.
pub(crate) fn open_database(file: &Path, create: bool) -> Result<Database, StoreError> {
    let db = if create {
        Database::create(file).map_err(storage_err)?
    } else {
        Database::open(file).map_err(storage_err)?
    };

    let stored_format = {
        let read_txn = db.begin_read().map_err(storage_err)?;
        match read_txn.open_table(METADATA) {
            Ok(table) => table
                .get(FORMAT_KEY)
                .map_err(storage_err)?
                .map(|v| v.value()),
            Err(redb::TableError::TableDoesNotExist(_)) => None,
            Err(e) => return Err(storage_err(e)),
        }
    };
    if let Some(found) = stored_format
        && found != u64::from(FORMAT_VERSION)
    {
        return Err(StoreError::Serialization(format!(
            "Unsupported store format: {} (expected {})",
            found, FORMAT_VERSION
        )));
    }

    // Initialize tables if they don't exist
    {
        let write_txn = db.begin_write().map_err(storage_err)?;
        let _ = write_txn.open_table(DICTIONARY).map_err(storage_err)?;
        let _ = write_txn.open_table(SNAPSHOT).map_err(storage_err)?;
        let _ = write_txn.open_table(PATCH_SPO).map_err(storage_err)?;
        let _ = write_txn.open_table(PATCH_POS).map_err(storage_err)?;
        let _ = write_txn.open_table(PATCH_OSP).map_err(storage_err)?;
        let _ = write_txn.open_table(PATCH_VERSIONS).map_err(storage_err)?;
        let _ = write_txn.open_table(VERSION_STATS).map_err(storage_err)?;
        {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_err)?;
            if stored_format.is_none() {
                meta.insert(FORMAT_KEY, u64::from(FORMAT_VERSION))
                    .map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)?;
    }

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::ReadableTableMetadata;
    use tempfile::tempdir;

    #[test]
    fn creates_all_tables() {
        let dir = tempdir().expect("tempdir");
        let db = open_database(&dir.path().join("t.redb"), true).expect("open");
        let read_txn = db.begin_read().expect("read");
        assert_eq!(read_txn.open_table(PATCH_SPO).expect("table").len().expect("len"), 0);
        let meta = read_txn.open_table(METADATA).expect("table");
        assert_eq!(
            meta.get(FORMAT_KEY).expect("get").map(|v| v.value()),
            Some(u64::from(FORMAT_VERSION))
        );
    }

    #[test]
    fn reopen_keeps_format() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("t.redb");
        drop(open_database(&file, true).expect("create"));
        assert!(open_database(&file, false).is_ok());
    }

    #[test]
    fn rejects_foreign_format() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("t.redb");
        {
            let db = open_database(&file, true).expect("create");
            let write_txn = db.begin_write().expect("write");
            {
                let mut meta = write_txn.open_table(METADATA).expect("table");
                meta.insert(FORMAT_KEY, 99u64).expect("insert");
            }
            write_txn.commit().expect("commit");
        }
        assert!(matches!(
            open_database(&file, false),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn missing_file_without_create_fails() {
        let dir = tempdir().expect("tempdir");
        assert!(open_database(&dir.path().join("absent.redb"), false).is_err());
    }
}
