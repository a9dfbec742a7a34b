//! # Store Primitives
//!
//! Compiled-in constants of the on-disk format and the default tuning of
//! the query engine. Tuning defaults can be overridden per store through
//! [`crate::StoreOptions`]; format constants cannot.

/// Magic bytes heading every compressed snapshot block.
pub const MAGIC_BYTES: &[u8; 4] = b"OSTR";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the block or record format.
pub const FORMAT_VERSION: u8 = 1;

/// Name of the redb database file inside a store directory.
pub const STORE_FILE_NAME: &str = "ostrich.redb";

/// First identifier of the patch partition.
///
/// Snapshot terms are numbered densely from 1; terms first seen in a patch
/// are numbered from here, so the two spaces can never collide however
/// large the snapshot grows.
pub const PATCH_ID_BASE: u64 = 1 << 48;

// =============================================================================
// QUERY TUNING DEFAULTS
// =============================================================================

/// Patch-tree entries fetched from storage per page.
///
/// Cancellation is checked between pages.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Matches counted beyond the requested page before falling back to an estimate.
pub const DEFAULT_EXACT_COUNT_LIMIT: usize = 10_000;

/// Triples per compressed snapshot block.
pub const DEFAULT_SNAPSHOT_BLOCK_SIZE: usize = 4096;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a single serialized term.
///
/// Longer terms are rejected before anything is written.
pub const MAX_TERM_LENGTH: usize = 65536;

/// Maximum encoded size of one snapshot block.
///
/// Validated before a block is decoded so a corrupted length cannot
/// trigger a huge allocation.
pub const MAX_BLOCK_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;
