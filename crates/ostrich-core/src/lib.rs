//! # ostrich-core
//!
//! A versioned RDF triple store: one snapshot at version 0 followed by an
//! append-only chain of patches, queryable in three modes.
//!
//! - **Version materialization**: the triples matching a pattern at one version
//! - **Delta materialization**: the triples whose presence differs between two versions
//! - **Version index**: every matching triple together with the versions it exists in
//!
//! Each query answers with a page of results and a total count that is
//! either exact or estimated from index statistics.
//!
//! ## Architectural Constraints
//!
//! - The version chain is append-only; a committed version never changes
//! - A version becomes visible to queries only after its write transaction commits
//! - All state lives behind an explicit [`OstrichStore`] handle, never in globals
//! - No async and no network dependencies; callers bring their own runtime

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub(crate) mod controller;
pub mod dictionary;
pub(crate) mod evaluator;
pub mod formats;
pub mod index;
pub mod ingestor;
pub mod primitives;
pub mod snapshot;
pub(crate) mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Count, DeltaTriple, EncodedElement, PatchElement, Role, SearchResult, StoreError, TermId,
    TermTriple, Triple, TriplePattern, Version, VersionStats, VersionedTriple,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use config::StoreOptions;
pub use controller::AppendOutcome;
pub use dictionary::DictionaryStats;
pub use evaluator::CancelHandle;
pub use ingestor::{ImportReport, Ingestor, VersionReport};
pub use store::{Features, OstrichStore, StoreMetadata};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{format_triple, parse_delta_line, parse_line};
