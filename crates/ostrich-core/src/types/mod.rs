//! # Core Type Definitions
//!
//! This module contains the shared types of the versioned triple store:
//! - Identifiers and encoded triples (`TermId`, `Triple`, `Role`)
//! - Boundary triples in term form (`TermTriple`, `PatchElement`)
//! - Query inputs and outputs (`TriplePattern`, `SearchResult`, `Count`)
//! - Error types (`StoreError`)
//!
//! ## Ordering Guarantees
//!
//! Encoded triples implement `Ord` over their identifiers. Every query result
//! is produced in the identifier order of the index that served it, so the
//! same query against the same version always yields the same sequence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// VERSIONS & IDENTIFIERS
// =============================================================================

/// A committed version number. Version 0 is the snapshot.
pub type Version = u32;

/// Compact identifier of a term within one dictionary role.
///
/// Identifiers below [`crate::primitives::PATCH_ID_BASE`] belong to the
/// snapshot dictionary, identifiers at or above it to terms first seen in a
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermId(pub u64);

impl TermId {
    /// Check whether this identifier was allocated by a patch.
    #[must_use]
    pub const fn is_patch_term(self) -> bool {
        self.0 >= crate::primitives::PATCH_ID_BASE
    }
}

/// The position a term occupies in a triple.
///
/// Each role has its own identifier space; subjects and objects additionally
/// share one section for terms that occur in both positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Subject,
    Predicate,
    Object,
}

impl Role {
    /// All roles in triple order.
    pub const ALL: [Role; 3] = [Role::Subject, Role::Predicate, Role::Object];

    /// Lower-case name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Role::Subject => "subject",
            Role::Predicate => "predicate",
            Role::Object => "object",
        }
    }
}

// =============================================================================
// ENCODED TRIPLES
// =============================================================================

/// A triple of dictionary identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
}

impl Triple {
    /// Create a triple from raw identifiers.
    #[must_use]
    pub const fn new(subject: u64, predicate: u64, object: u64) -> Self {
        Self {
            subject: TermId(subject),
            predicate: TermId(predicate),
            object: TermId(object),
        }
    }

    /// The identifiers as an SPO key tuple.
    #[must_use]
    pub const fn spo(&self) -> (u64, u64, u64) {
        (self.subject.0, self.predicate.0, self.object.0)
    }
}

/// An encoded patch element: a triple plus its addition flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EncodedElement {
    pub triple: Triple,
    pub addition: bool,
}

// =============================================================================
// TERM-LEVEL TRIPLES (BOUNDARY)
// =============================================================================

/// A triple in term form, as exchanged with callers.
///
/// Terms use the bare serialization: IRIs without angle brackets, literals
/// quoted, datatypes unbracketed (`"1"^^http://www.w3.org/2001/XMLSchema#int`),
/// blank nodes as `_:label`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl TermTriple {
    /// Create a new term triple.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// The term occupying `role`.
    #[must_use]
    pub fn term(&self, role: Role) -> &str {
        match role {
            Role::Subject => &self.subject,
            Role::Predicate => &self.predicate,
            Role::Object => &self.object,
        }
    }
}

impl std::fmt::Display for TermTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// One change of a patch: a triple that is added or removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatchElement {
    pub triple: TermTriple,
    pub addition: bool,
}

impl PatchElement {
    /// Create an element from its three terms.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        addition: bool,
    ) -> Self {
        Self {
            triple: TermTriple::new(subject, predicate, object),
            addition,
        }
    }

    /// An addition of the given triple.
    #[must_use]
    pub fn addition(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, predicate, object, true)
    }

    /// A deletion of the given triple.
    #[must_use]
    pub fn deletion(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self::new(subject, predicate, object, false)
    }
}

/// A delta-materialized result: a triple with its net direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaTriple {
    pub triple: TermTriple,
    pub addition: bool,
}

/// A version-index result: a triple with every version it holds in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedTriple {
    pub triple: TermTriple,
    pub versions: Vec<Version>,
}

// =============================================================================
// PATTERNS
// =============================================================================

/// A triple pattern: each component is either a bound term or a wildcard.
///
/// Bound terms use the bare serialization of [`TermTriple`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
}

impl TriplePattern {
    /// Build a pattern from three strings.
    ///
    /// An empty string or a variable (`?name`) is a wildcard.
    #[must_use]
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: bound(subject),
            predicate: bound(predicate),
            object: bound(object),
        }
    }

    /// The pattern matching every triple.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Bind the subject.
    #[must_use]
    pub fn with_subject(mut self, term: impl Into<String>) -> Self {
        self.subject = Some(term.into());
        self
    }

    /// Bind the predicate.
    #[must_use]
    pub fn with_predicate(mut self, term: impl Into<String>) -> Self {
        self.predicate = Some(term.into());
        self
    }

    /// Bind the object.
    #[must_use]
    pub fn with_object(mut self, term: impl Into<String>) -> Self {
        self.object = Some(term.into());
        self
    }

    /// The bound term for `role`, if any.
    #[must_use]
    pub fn term(&self, role: Role) -> Option<&str> {
        match role {
            Role::Subject => self.subject.as_deref(),
            Role::Predicate => self.predicate.as_deref(),
            Role::Object => self.object.as_deref(),
        }
    }

    /// Check if no component is bound.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.subject.is_none() && self.predicate.is_none() && self.object.is_none()
    }
}

fn bound(term: &str) -> Option<String> {
    if term.is_empty() || term.starts_with('?') {
        None
    } else {
        Some(term.to_string())
    }
}

// =============================================================================
// QUERY OUTPUT
// =============================================================================

/// A result count, either exact or estimated from index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub total_count: u64,
    pub has_exact_count: bool,
}

impl Count {
    /// An exact count.
    #[must_use]
    pub const fn exact(total_count: u64) -> Self {
        Self {
            total_count,
            has_exact_count: true,
        }
    }

    /// An estimated count.
    #[must_use]
    pub const fn estimate(total_count: u64) -> Self {
        Self {
            total_count,
            has_exact_count: false,
        }
    }
}

/// One page of query results together with the total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub has_exact_count: bool,
}

impl<T> SearchResult<T> {
    /// The count part of this result.
    #[must_use]
    pub const fn count(&self) -> Count {
        Count {
            total_count: self.total_count,
            has_exact_count: self.has_exact_count,
        }
    }
}

/// Statistics of one committed version, recorded at commit time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStats {
    /// Addition elements in the version's patch (snapshot triples for version 0).
    pub additions: u64,
    /// Deletion elements in the version's patch.
    pub deletions: u64,
    /// Triples present in the materialized version.
    pub live_triples: u64,
    /// Terms first introduced by this version.
    pub new_terms: u64,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the store.
///
/// - No silent failures: every fallible operation returns `Result<T, StoreError>`
/// - Nothing is retried by the store; retry policy belongs to the caller
/// - A failed append leaves the version chain untouched
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed pattern or term, non-sequential input, bad snapshot contents.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown version or identifier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Version already committed or appended out of order.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The durable layer failed.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A persisted record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The caller aborted a running query.
    #[error("Query cancelled")]
    Cancelled,

    /// The store handle was closed.
    #[error("Store is closed")]
    Closed,
}

/// Map a storage-layer error into [`StoreError::StorageFailure`].
pub(crate) fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::StorageFailure(e.to_string())
}

/// Map an encoding error into [`StoreError::Serialization`].
pub(crate) fn serialization_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(e.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
