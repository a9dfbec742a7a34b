//! # Property-Based Tests
//!
//! Random version chains checked against a plain set-folding model, plus
//! the term-form conversions.

use ostrich_core::formats::{to_bare, to_bracketed};
use ostrich_core::{OstrichStore, PatchElement, StoreOptions, TermTriple, TriplePattern, Version};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::{TempDir, tempdir};

type Model = Vec<BTreeSet<TermTriple>>;

fn triple_strategy() -> impl Strategy<Value = TermTriple> {
    (0u8..4, 0u8..2, 0u8..5).prop_map(|(s, p, o)| {
        let object = if o == 4 {
            format!("\"{}\"^^http://example.org/t", s)
        } else {
            format!("o{}", o)
        };
        TermTriple::new(format!("s{}", s), format!("p{}", p), object)
    })
}

/// A snapshot plus a list of toggle sets, one per patch.
fn chain_strategy() -> impl Strategy<Value = (BTreeSet<TermTriple>, Vec<BTreeSet<TermTriple>>)> {
    (
        btree_set(triple_strategy(), 0..12),
        vec(btree_set(triple_strategy(), 1..6), 1..5),
    )
}

/// Commit the chain and return the expected triple set of every version.
fn build(
    snapshot: &BTreeSet<TermTriple>,
    toggles: &[BTreeSet<TermTriple>],
) -> (TempDir, OstrichStore, Model) {
    let dir = tempdir().expect("tempdir");
    let options = StoreOptions {
        page_size: 4,
        snapshot_block_size: 3,
        ..StoreOptions::default()
    };
    let store = OstrichStore::open(dir.path().join("store"), options).expect("open");
    store
        .append(
            snapshot
                .iter()
                .map(|t| PatchElement {
                    triple: t.clone(),
                    addition: true,
                })
                .collect(),
            Some(0),
        )
        .expect("snapshot");

    let mut model = vec![snapshot.clone()];
    for (index, toggle) in toggles.iter().enumerate() {
        let mut state = model[index].clone();
        let mut elements = Vec::new();
        for triple in toggle {
            let addition = !state.contains(triple);
            if addition {
                state.insert(triple.clone());
            } else {
                state.remove(triple);
            }
            elements.push(PatchElement {
                triple: triple.clone(),
                addition,
            });
        }
        store
            .append(elements, Some(index as Version + 1))
            .expect("patch");
        model.push(state);
    }
    (dir, store, model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every version materializes to the fold of its patches.
    #[test]
    fn version_materialized_matches_model((snapshot, toggles) in chain_strategy()) {
        let (_dir, store, model) = build(&snapshot, &toggles);
        for (version, expected) in model.iter().enumerate() {
            let result = store
                .search_version_materialized(&TriplePattern::any(), 0, 0, Some(version as Version))
                .expect("vm");
            let actual: BTreeSet<TermTriple> = result.items.iter().cloned().collect();
            prop_assert_eq!(actual.len(), result.items.len());
            prop_assert_eq!(&actual, expected);
            prop_assert!(result.has_exact_count);
            prop_assert_eq!(result.total_count, expected.len() as u64);
        }
    }

    /// Bound patterns select the matching subset of the model.
    #[test]
    fn bound_patterns_match_model(
        (snapshot, toggles) in chain_strategy(),
        subject in prop::option::of(0u8..4),
        object in prop::option::of(0u8..4),
    ) {
        let (_dir, store, model) = build(&snapshot, &toggles);
        let mut pattern = TriplePattern::any();
        if let Some(s) = subject {
            pattern = pattern.with_subject(format!("s{}", s));
        }
        if let Some(o) = object {
            pattern = pattern.with_object(format!("o{}", o));
        }
        for (version, state) in model.iter().enumerate() {
            let expected: BTreeSet<TermTriple> = state
                .iter()
                .filter(|t| subject.is_none_or(|s| t.subject == format!("s{}", s)))
                .filter(|t| object.is_none_or(|o| t.object == format!("o{}", o)))
                .cloned()
                .collect();
            let result = store
                .search_version_materialized(&pattern, 0, 0, Some(version as Version))
                .expect("vm");
            let actual: BTreeSet<TermTriple> = result.items.into_iter().collect();
            prop_assert_eq!(actual, expected);
        }
    }

    /// A delta holds exactly the triples whose presence differs, so changes
    /// that cancel out inside the range never show up.
    #[test]
    fn delta_is_symmetric_difference(
        (snapshot, toggles) in chain_strategy(),
        a in 0usize..5,
        b in 0usize..5,
    ) {
        let (_dir, store, model) = build(&snapshot, &toggles);
        let max = model.len() - 1;
        let (start, end) = (a.min(b).min(max), a.max(b).min(max));
        prop_assume!(start < end);

        let result = store
            .search_delta_materialized(
                &TriplePattern::any(),
                0,
                0,
                start as Version,
                Some(end as Version),
            )
            .expect("dm");
        let actual: BTreeMap<TermTriple, bool> = result
            .items
            .into_iter()
            .map(|d| (d.triple, d.addition))
            .collect();
        let mut expected = BTreeMap::new();
        for t in model[end].difference(&model[start]) {
            expected.insert(t.clone(), true);
        }
        for t in model[start].difference(&model[end]) {
            expected.insert(t.clone(), false);
        }
        prop_assert_eq!(actual, expected);
    }

    /// The version index lists each triple with the versions it holds in.
    #[test]
    fn version_index_matches_model((snapshot, toggles) in chain_strategy()) {
        let (_dir, store, model) = build(&snapshot, &toggles);
        let mut expected: BTreeMap<TermTriple, Vec<Version>> = BTreeMap::new();
        for (version, state) in model.iter().enumerate() {
            for triple in state {
                expected.entry(triple.clone()).or_default().push(version as Version);
            }
        }
        let result = store.search_version(&TriplePattern::any(), 0, 0).expect("vi");
        prop_assert_eq!(result.total_count, expected.len() as u64);
        let actual: BTreeMap<TermTriple, Vec<Version>> = result
            .items
            .into_iter()
            .map(|v| (v.triple, v.versions))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    /// Bare and bracketed typed literals convert losslessly both ways.
    #[test]
    fn typed_literal_round_trip(
        value in "[a-zA-Z0-9 ]{0,12}",
        datatype in "[a-z]{1,8}:[a-zA-Z0-9/#.]{1,16}",
    ) {
        let bare = format!("\"{}\"^^{}", value, datatype);
        let bracketed = to_bracketed(&bare).into_owned();
        prop_assert_eq!(&bracketed, &format!("\"{}\"^^<{}>", value, datatype));
        let converted_1 = to_bare(&bracketed);
        prop_assert_eq!(converted_1.as_ref(), bare.as_str());
        let converted_2 = to_bracketed(&bracketed);
        prop_assert_eq!(converted_2.as_ref(), bracketed.as_str());
        let converted_3 = to_bare(&bare);
        prop_assert_eq!(converted_3.as_ref(), bare.as_str());
    }

    /// IRIs and plain literals pass through both conversions untouched.
    #[test]
    fn other_terms_unchanged(iri in "[a-z]{1,6}:[a-z0-9/]{0,10}", tag in "[a-z]{2}") {
        let literal = format!("\"x\"@{}", tag);
        let converted_4 = to_bracketed(&iri);
        prop_assert_eq!(converted_4.as_ref(), iri.as_str());
        let converted_5 = to_bare(&iri);
        prop_assert_eq!(converted_5.as_ref(), iri.as_str());
        let converted_6 = to_bracketed(&literal);
        prop_assert_eq!(converted_6.as_ref(), literal.as_str());
    }
}
