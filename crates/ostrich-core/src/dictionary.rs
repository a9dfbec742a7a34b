//! # Term Dictionary
//!
//! Bidirectional mapping between terms and compact identifiers, one
//! identifier space per role.
//!
//! ## Layout
//!
//! The base dictionary is built once with the snapshot and never changes.
//! Its sections are sorted, so lookups are binary searches:
//!
//! - `shared`: terms used both as subject and as object, ids `1..=|shared|`
//!   in both roles
//! - `subjects` / `objects`: the remaining subject-only and object-only
//!   terms, numbered after the shared section
//! - `predicates`: ids `1..=|predicates|`
//!
//! Terms first seen in a patch go to the patch partition, numbered from
//! [`PATCH_ID_BASE`]. Subjects and objects share one patch counter, so a
//! term introduced as an object and later used as a subject keeps its id.
//!
//! ## Growth
//!
//! Appends never touch a live dictionary. A [`TermAllocator`] reads the
//! current mapping and collects new terms on the side; the controller writes
//! them in the version's transaction and applies them with
//! [`Dictionary::apply`] after the commit, under the dictionary's write lock.

use crate::formats::literal;
use crate::index::EncodedPattern;
use crate::primitives::PATCH_ID_BASE;
use crate::types::storage_err;
use crate::{Role, StoreError, TermId, TermTriple, Triple, TriplePattern};
use redb::{ReadableTable, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Shared,
    Subjects,
    Predicates,
    Objects,
    PatchNodes,
    PatchPredicates,
}

impl Section {
    const ALL: [Section; 6] = [
        Section::Shared,
        Section::Subjects,
        Section::Predicates,
        Section::Objects,
        Section::PatchNodes,
        Section::PatchPredicates,
    ];

    const fn tag(self) -> u8 {
        match self {
            Section::Shared => 0,
            Section::Subjects => 1,
            Section::Predicates => 2,
            Section::Objects => 3,
            Section::PatchNodes => 4,
            Section::PatchPredicates => 5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

/// Section sizes, reported in store metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryStats {
    pub shared: u64,
    pub subjects: u64,
    pub predicates: u64,
    pub objects: u64,
    pub patch_terms: u64,
}

// =============================================================================
// DICTIONARY
// =============================================================================

/// The in-memory term dictionary.
///
/// Terms are held in the bracketed internal form.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    shared: Vec<String>,
    subjects: Vec<String>,
    predicates: Vec<String>,
    objects: Vec<String>,
    patch_nodes: Vec<String>,
    patch_predicates: Vec<String>,
    patch_node_ids: BTreeMap<String, u64>,
    patch_predicate_ids: BTreeMap<String, u64>,
}

impl Dictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the base dictionary from the snapshot's triples.
    #[must_use]
    pub fn build_base(triples: &[TermTriple]) -> Self {
        let mut subjects = BTreeSet::new();
        let mut predicates = BTreeSet::new();
        let mut objects = BTreeSet::new();
        for triple in triples {
            subjects.insert(triple.subject.as_str());
            predicates.insert(triple.predicate.as_str());
            objects.insert(triple.object.as_str());
        }
        let shared: Vec<String> = subjects
            .intersection(&objects)
            .map(|t| (*t).to_string())
            .collect();
        let subject_only: Vec<String> = subjects
            .difference(&objects)
            .map(|t| (*t).to_string())
            .collect();
        let object_only: Vec<String> = objects
            .difference(&subjects)
            .map(|t| (*t).to_string())
            .collect();

        Self {
            shared,
            subjects: subject_only,
            predicates: predicates.into_iter().map(str::to_string).collect(),
            objects: object_only,
            ..Self::default()
        }
    }

    /// Look up the identifier of an internal-form term.
    #[must_use]
    pub fn lookup(&self, term: &str, role: Role) -> Option<TermId> {
        if let Some(id) = self.lookup_base(term, role) {
            return Some(id);
        }
        let ids = match role {
            Role::Predicate => &self.patch_predicate_ids,
            Role::Subject | Role::Object => &self.patch_node_ids,
        };
        ids.get(term).map(|&id| TermId(id))
    }

    fn lookup_base(&self, term: &str, role: Role) -> Option<TermId> {
        let position = |section: &[String]| section.binary_search_by(|t| t.as_str().cmp(term)).ok();
        match role {
            Role::Predicate => position(&self.predicates).map(|i| TermId(i as u64 + 1)),
            Role::Subject | Role::Object => {
                if let Some(i) = position(&self.shared) {
                    return Some(TermId(i as u64 + 1));
                }
                let own = if role == Role::Subject {
                    &self.subjects
                } else {
                    &self.objects
                };
                position(own).map(|i| TermId((self.shared.len() + i) as u64 + 1))
            }
        }
    }

    /// Resolve an identifier back to its internal-form term.
    pub fn decode(&self, id: TermId, role: Role) -> Result<&str, StoreError> {
        let found = if id.is_patch_term() {
            let index = (id.0 - PATCH_ID_BASE) as usize;
            let section = match role {
                Role::Predicate => &self.patch_predicates,
                Role::Subject | Role::Object => &self.patch_nodes,
            };
            section.get(index).map(String::as_str)
        } else if id.0 == 0 {
            None
        } else {
            let index = (id.0 - 1) as usize;
            match role {
                Role::Predicate => self.predicates.get(index).map(String::as_str),
                Role::Subject | Role::Object => {
                    if index < self.shared.len() {
                        self.shared.get(index).map(String::as_str)
                    } else {
                        let own = if role == Role::Subject {
                            &self.subjects
                        } else {
                            &self.objects
                        };
                        own.get(index - self.shared.len()).map(String::as_str)
                    }
                }
            }
        };
        found.ok_or_else(|| StoreError::NotFound(format!("{} id {}", role.name(), id.0)))
    }

    /// Decode an encoded triple into bare boundary form.
    pub fn decode_triple(&self, triple: Triple) -> Result<TermTriple, StoreError> {
        Ok(TermTriple::new(
            literal::to_bare(self.decode(triple.subject, Role::Subject)?),
            literal::to_bare(self.decode(triple.predicate, Role::Predicate)?),
            literal::to_bare(self.decode(triple.object, Role::Object)?),
        ))
    }

    /// Encode an internal-form triple without allocating.
    #[must_use]
    pub fn lookup_triple(&self, triple: &TermTriple) -> Option<Triple> {
        Some(Triple {
            subject: self.lookup(&triple.subject, Role::Subject)?,
            predicate: self.lookup(&triple.predicate, Role::Predicate)?,
            object: self.lookup(&triple.object, Role::Object)?,
        })
    }

    /// Encode the bound terms of an internal-form pattern.
    ///
    /// Returns `None` if any bound term is unknown; such a pattern cannot
    /// match anything.
    #[must_use]
    pub fn encode_pattern(&self, pattern: &TriplePattern) -> Option<EncodedPattern> {
        let mut encoded = EncodedPattern::default();
        for role in Role::ALL {
            if let Some(term) = pattern.term(role) {
                let id = Some(self.lookup(term, role)?);
                match role {
                    Role::Subject => encoded.subject = id,
                    Role::Predicate => encoded.predicate = id,
                    Role::Object => encoded.object = id,
                }
            }
        }
        Some(encoded)
    }

    #[must_use]
    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            shared: self.shared.len() as u64,
            subjects: self.subjects.len() as u64,
            predicates: self.predicates.len() as u64,
            objects: self.objects.len() as u64,
            patch_terms: (self.patch_nodes.len() + self.patch_predicates.len()) as u64,
        }
    }

    /// Total number of distinct (term, partition) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len()
            + self.subjects.len()
            + self.predicates.len()
            + self.objects.len()
            + self.patch_nodes.len()
            + self.patch_predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start collecting the new terms of one append.
    #[must_use]
    pub fn allocator(&self) -> TermAllocator<'_> {
        TermAllocator {
            dictionary: self,
            nodes: Vec::new(),
            predicates: Vec::new(),
            node_ids: BTreeMap::new(),
            predicate_ids: BTreeMap::new(),
        }
    }

    /// Append terms collected by a [`TermAllocator`].
    ///
    /// The batch must have been allocated against this exact dictionary
    /// state; anything else would shift identifiers.
    pub fn apply(&mut self, batch: NewTerms) -> Result<(), StoreError> {
        if batch.first_node != self.patch_nodes.len()
            || batch.first_predicate != self.patch_predicates.len()
        {
            return Err(StoreError::Conflict(
                "term batch allocated against a stale dictionary".to_string(),
            ));
        }
        for term in batch.nodes {
            let id = PATCH_ID_BASE + self.patch_nodes.len() as u64;
            self.patch_node_ids.insert(term.clone(), id);
            self.patch_nodes.push(term);
        }
        for term in batch.predicates {
            let id = PATCH_ID_BASE + self.patch_predicates.len() as u64;
            self.patch_predicate_ids.insert(term.clone(), id);
            self.patch_predicates.push(term);
        }
        Ok(())
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Write the base sections.
    pub(crate) fn persist_base(
        &self,
        table: &mut Table<'_, (u8, u64), &'static str>,
    ) -> Result<(), StoreError> {
        let sections = [
            (Section::Shared, &self.shared),
            (Section::Subjects, &self.subjects),
            (Section::Predicates, &self.predicates),
            (Section::Objects, &self.objects),
        ];
        for (section, terms) in sections {
            for (index, term) in terms.iter().enumerate() {
                insert_entry(table, section, index as u64 + 1, term)?;
            }
        }
        Ok(())
    }

    /// Rebuild the dictionary from its table.
    pub(crate) fn load<T>(table: &T) -> Result<Self, StoreError>
    where
        T: ReadableTable<(u8, u64), &'static str>,
    {
        let mut dictionary = Self::new();
        for entry in table.iter().map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let (tag, id) = key.value();
            let section = Section::from_tag(tag).ok_or_else(|| {
                StoreError::Serialization(format!("Unknown dictionary section {}", tag))
            })?;
            dictionary.restore(section, id, value.value().to_string())?;
        }
        tracing::debug!(terms = dictionary.len(), "dictionary loaded");
        Ok(dictionary)
    }

    fn restore(&mut self, section: Section, id: u64, term: String) -> Result<(), StoreError> {
        let (expected, patch_ids) = match section {
            Section::Shared => (self.shared.len() as u64 + 1, None),
            Section::Subjects => (self.subjects.len() as u64 + 1, None),
            Section::Predicates => (self.predicates.len() as u64 + 1, None),
            Section::Objects => (self.objects.len() as u64 + 1, None),
            Section::PatchNodes => (
                PATCH_ID_BASE + self.patch_nodes.len() as u64,
                Some(&mut self.patch_node_ids),
            ),
            Section::PatchPredicates => (
                PATCH_ID_BASE + self.patch_predicates.len() as u64,
                Some(&mut self.patch_predicate_ids),
            ),
        };
        if id != expected {
            return Err(StoreError::Serialization(format!(
                "Dictionary gap: found id {} where {} was expected",
                id, expected
            )));
        }
        if let Some(ids) = patch_ids {
            ids.insert(term.clone(), id);
        }
        let terms = match section {
            Section::Shared => &mut self.shared,
            Section::Subjects => &mut self.subjects,
            Section::Predicates => &mut self.predicates,
            Section::Objects => &mut self.objects,
            Section::PatchNodes => &mut self.patch_nodes,
            Section::PatchPredicates => &mut self.patch_predicates,
        };
        terms.push(term);
        Ok(())
    }
}

fn insert_entry(
    table: &mut Table<'_, (u8, u64), &'static str>,
    section: Section,
    id: u64,
    term: &str,
) -> Result<(), StoreError> {
    table.insert((section.tag(), id), term).map_err(storage_err)?;
    Ok(())
}

// =============================================================================
// ALLOCATION
// =============================================================================

/// Encodes the terms of one append, allocating ids for unseen terms.
#[derive(Debug)]
pub struct TermAllocator<'a> {
    dictionary: &'a Dictionary,
    nodes: Vec<String>,
    predicates: Vec<String>,
    node_ids: BTreeMap<String, u64>,
    predicate_ids: BTreeMap<String, u64>,
}

impl TermAllocator<'_> {
    /// Encode an internal-form term, allocating a patch id if it is new.
    pub fn encode(&mut self, term: &str, role: Role) -> TermId {
        if let Some(id) = self.dictionary.lookup(term, role) {
            return id;
        }
        let (pending, ids, committed) = match role {
            Role::Predicate => (
                &mut self.predicates,
                &mut self.predicate_ids,
                self.dictionary.patch_predicates.len(),
            ),
            Role::Subject | Role::Object => (
                &mut self.nodes,
                &mut self.node_ids,
                self.dictionary.patch_nodes.len(),
            ),
        };
        if let Some(&id) = ids.get(term) {
            return TermId(id);
        }
        let id = PATCH_ID_BASE + (committed + pending.len()) as u64;
        pending.push(term.to_string());
        ids.insert(term.to_string(), id);
        TermId(id)
    }

    /// Encode an internal-form triple.
    pub fn encode_triple(&mut self, triple: &TermTriple) -> Triple {
        Triple {
            subject: self.encode(&triple.subject, Role::Subject),
            predicate: self.encode(&triple.predicate, Role::Predicate),
            object: self.encode(&triple.object, Role::Object),
        }
    }

    /// Finish allocation and hand over the new terms.
    #[must_use]
    pub fn finish(self) -> NewTerms {
        NewTerms {
            first_node: self.dictionary.patch_nodes.len(),
            first_predicate: self.dictionary.patch_predicates.len(),
            nodes: self.nodes,
            predicates: self.predicates,
        }
    }
}

/// Terms introduced by one version, not yet applied to the dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerms {
    first_node: usize,
    first_predicate: usize,
    nodes: Vec<String>,
    predicates: Vec<String>,
}

impl NewTerms {
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn persist(
        &self,
        table: &mut Table<'_, (u8, u64), &'static str>,
    ) -> Result<(), StoreError> {
        for (offset, term) in self.nodes.iter().enumerate() {
            let id = PATCH_ID_BASE + (self.first_node + offset) as u64;
            insert_entry(table, Section::PatchNodes, id, term)?;
        }
        for (offset, term) in self.predicates.iter().enumerate() {
            let id = PATCH_ID_BASE + (self.first_predicate + offset) as u64;
            insert_entry(table, Section::PatchPredicates, id, term)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
