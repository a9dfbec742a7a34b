//! # Three-Version Archive Tests
//!
//! Queries in all three modes against a small archive:
//!
//! ```text
//! 0 -> 1:  - a a "b"   + a a "z"   - a b a   + a b g   - a b z   + f f f   + z z z
//! 1 -> 2:  - a a "z"   - f f f     + f r s   + q q q   + r r r
//! ```

use ostrich_core::{
    Count, OstrichStore, PatchElement, StoreError, StoreOptions, TermTriple, TriplePattern,
    Version,
};
use std::collections::BTreeMap;
use tempfile::{TempDir, tempdir};

const LITERAL: &str = "http://example.org/literal";

fn lit(value: &str) -> String {
    format!("\"{}\"^^{}", value, LITERAL)
}

fn add(s: &str, p: &str, o: &str) -> PatchElement {
    PatchElement::addition(s, p, o)
}

fn del(s: &str, p: &str, o: &str) -> PatchElement {
    PatchElement::deletion(s, p, o)
}

fn version_0() -> Vec<PatchElement> {
    vec![
        add("a", "a", &lit("a")),
        add("a", "a", &lit("b")),
        add("a", "b", "a"),
        add("a", "b", "c"),
        add("a", "b", "d"),
        add("a", "b", "f"),
        add("a", "b", "z"),
        add("c", "c", "c"),
    ]
}

fn version_1() -> Vec<PatchElement> {
    vec![
        del("a", "a", &lit("b")),
        add("a", "a", &lit("z")),
        del("a", "b", "a"),
        add("a", "b", "g"),
        del("a", "b", "z"),
        add("f", "f", "f"),
        add("z", "z", "z"),
    ]
}

fn version_2() -> Vec<PatchElement> {
    vec![
        del("a", "a", &lit("z")),
        del("f", "f", "f"),
        add("f", "r", "s"),
        add("q", "q", "q"),
        add("r", "r", "r"),
    ]
}

fn three_versions(options: StoreOptions) -> (TempDir, OstrichStore) {
    let dir = tempdir().expect("tempdir");
    let store = OstrichStore::open(dir.path().join("archive"), options).expect("open");
    assert_eq!(store.append(version_0(), Some(0)).expect("v0"), 8);
    assert_eq!(store.append(version_1(), Some(1)).expect("v1"), 7);
    assert_eq!(store.append(version_2(), Some(2)).expect("v2"), 5);
    (dir, store)
}

fn store() -> (TempDir, OstrichStore) {
    three_versions(StoreOptions::default())
}

fn t(s: &str, p: &str, o: &str) -> TermTriple {
    TermTriple::new(s, p, o)
}

fn sorted(mut triples: Vec<TermTriple>) -> Vec<TermTriple> {
    triples.sort();
    triples
}

fn vm(store: &OstrichStore, pattern: &TriplePattern, version: Version) -> Vec<TermTriple> {
    let result = store
        .search_version_materialized(pattern, 0, 0, Some(version))
        .expect("vm");
    assert_eq!(result.count(), Count::exact(result.items.len() as u64));
    sorted(result.items)
}

// =============================================================================
// VERSION MATERIALIZED
// =============================================================================

#[test]
fn materializes_each_version() {
    let (_dir, store) = store();
    let any = TriplePattern::any();

    assert_eq!(
        vm(&store, &any, 0),
        sorted(version_0().into_iter().map(|e| e.triple).collect())
    );
    assert_eq!(
        vm(&store, &any, 1),
        sorted(vec![
            t("a", "a", &lit("a")),
            t("a", "a", &lit("z")),
            t("a", "b", "c"),
            t("a", "b", "d"),
            t("a", "b", "f"),
            t("a", "b", "g"),
            t("c", "c", "c"),
            t("f", "f", "f"),
            t("z", "z", "z"),
        ])
    );
    assert_eq!(
        vm(&store, &any, 2),
        sorted(vec![
            t("a", "a", &lit("a")),
            t("a", "b", "c"),
            t("a", "b", "d"),
            t("a", "b", "f"),
            t("a", "b", "g"),
            t("c", "c", "c"),
            t("f", "r", "s"),
            t("q", "q", "q"),
            t("r", "r", "r"),
            t("z", "z", "z"),
        ])
    );
}

#[test]
fn latest_version_is_the_default() {
    let (_dir, store) = store();
    let pattern = TriplePattern::any().with_subject("a");
    let latest = store
        .search_version_materialized(&pattern, 0, 0, None)
        .expect("vm");
    assert_eq!(sorted(latest.items), vm(&store, &pattern, 2));
}

#[test]
fn bound_patterns_per_version() {
    let (_dir, store) = store();
    let subject_a = TriplePattern::any().with_subject("a");
    let predicate_b = TriplePattern::any().with_predicate("b");
    let object_c = TriplePattern::any().with_object("c");

    let counts: Vec<usize> = (0..3).map(|v| vm(&store, &subject_a, v).len()).collect();
    assert_eq!(counts, vec![7, 6, 5]);
    let counts: Vec<usize> = (0..3).map(|v| vm(&store, &predicate_b, v).len()).collect();
    assert_eq!(counts, vec![5, 4, 4]);
    for version in 0..3 {
        assert_eq!(
            vm(&store, &object_c, version),
            vec![t("a", "b", "c"), t("c", "c", "c")]
        );
    }

    let exact = TriplePattern::new("a", "b", "g");
    assert!(vm(&store, &exact, 0).is_empty());
    assert_eq!(vm(&store, &exact, 1), vec![t("a", "b", "g")]);
}

#[test]
fn typed_literal_objects_match_in_bare_form() {
    let (_dir, store) = store();
    let z = TriplePattern::any().with_object(lit("z"));
    assert!(vm(&store, &z, 0).is_empty());
    assert_eq!(vm(&store, &z, 1), vec![t("a", "a", &lit("z"))]);
    assert!(vm(&store, &z, 2).is_empty());

    let bracketed = TriplePattern::any().with_object(format!("\"a\"^^<{}>", LITERAL));
    assert_eq!(vm(&store, &bracketed, 2), vec![t("a", "a", &lit("a"))]);
}

#[test]
fn offset_and_limit_page_through_results() {
    let (_dir, store) = store();
    let pattern = TriplePattern::any().with_subject("a");
    let full = store
        .search_version_materialized(&pattern, 0, 0, Some(0))
        .expect("full")
        .items;
    assert_eq!(full.len(), 7);

    let page = store
        .search_version_materialized(&pattern, 2, 3, Some(0))
        .expect("page");
    assert_eq!(page.items, full[2..5].to_vec());
    assert_eq!(page.count(), Count::exact(7));

    let past_end = store
        .search_version_materialized(&pattern, 10, 2, Some(0))
        .expect("past end");
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total_count, 7);
}

#[test]
fn unknown_term_matches_nothing_with_estimate() {
    let (_dir, store) = store();
    let pattern = TriplePattern::any().with_subject("unknown");
    let result = store
        .search_version_materialized(&pattern, 0, 0, Some(1))
        .expect("vm");
    assert!(result.items.is_empty());
    assert_eq!(result.count(), Count::estimate(0));
    assert_eq!(
        store.count_delta_materialized(&pattern, 0, None).expect("dm"),
        Count::estimate(0)
    );
    assert_eq!(store.count_version(&pattern).expect("vi"), Count::estimate(0));
}

#[test]
fn wildcard_count_is_exact_per_version() {
    let (_dir, store) = store();
    let counts: Vec<Count> = (0..3)
        .map(|v| {
            store
                .count_version_materialized(&TriplePattern::any(), Some(v))
                .expect("count")
        })
        .collect();
    assert_eq!(counts, vec![Count::exact(8), Count::exact(9), Count::exact(10)]);
}

#[test]
fn counts_beyond_limit_are_estimates_not_below_matches() {
    let options = StoreOptions {
        exact_count_limit: 2,
        ..StoreOptions::default()
    };
    let (_dir, store) = three_versions(options);
    let pattern = TriplePattern::any().with_subject("a");

    let result = store
        .search_version_materialized(&pattern, 0, 1, Some(0))
        .expect("vm");
    assert_eq!(result.items.len(), 1);
    assert!(!result.has_exact_count);
    assert!(result.total_count >= 7);

    let count = store.count_version(&pattern).expect("vi");
    assert!(!count.has_exact_count);
    assert!(count.total_count >= 10);

    // The wildcard stays exact through version statistics.
    let wildcard = store
        .search_version_materialized(&TriplePattern::any(), 0, 1, Some(2))
        .expect("vm");
    assert_eq!(wildcard.count(), Count::exact(10));
}

#[test]
fn missing_version_is_not_found() {
    let (_dir, store) = store();
    assert!(matches!(
        store.search_version_materialized(&TriplePattern::any(), 0, 0, Some(3)),
        Err(StoreError::NotFound(_))
    ));
}

// =============================================================================
// DELTA MATERIALIZED
// =============================================================================

fn dm(store: &OstrichStore, start: Version, end: Version) -> BTreeMap<TermTriple, bool> {
    let result = store
        .search_delta_materialized(&TriplePattern::any(), 0, 0, start, Some(end))
        .expect("dm");
    assert!(result.has_exact_count);
    assert_eq!(result.total_count, result.items.len() as u64);
    result
        .items
        .into_iter()
        .map(|d| (d.triple, d.addition))
        .collect()
}

#[test]
fn delta_between_adjacent_versions() {
    let (_dir, store) = store();
    let expected: BTreeMap<TermTriple, bool> = version_1()
        .into_iter()
        .map(|e| (e.triple, e.addition))
        .collect();
    assert_eq!(dm(&store, 0, 1), expected);

    let expected: BTreeMap<TermTriple, bool> = version_2()
        .into_iter()
        .map(|e| (e.triple, e.addition))
        .collect();
    assert_eq!(dm(&store, 1, 2), expected);
}

#[test]
fn delta_across_versions_drops_net_zero_changes() {
    let (_dir, store) = store();
    let delta = dm(&store, 0, 2);
    let expected: BTreeMap<TermTriple, bool> = [
        (t("a", "a", &lit("b")), false),
        (t("a", "b", "a"), false),
        (t("a", "b", "z"), false),
        (t("a", "b", "g"), true),
        (t("z", "z", "z"), true),
        (t("f", "r", "s"), true),
        (t("q", "q", "q"), true),
        (t("r", "r", "r"), true),
    ]
    .into_iter()
    .collect();
    assert_eq!(delta, expected);
    assert!(!delta.contains_key(&t("f", "f", "f")));
    assert!(!delta.contains_key(&t("a", "a", &lit("z"))));
}

#[test]
fn delta_with_pattern_and_default_end() {
    let (_dir, store) = store();
    let pattern = TriplePattern::any().with_predicate("b");
    let result = store
        .search_delta_materialized(&pattern, 0, 0, 0, None)
        .expect("dm");
    let directions: BTreeMap<TermTriple, bool> = result
        .items
        .into_iter()
        .map(|d| (d.triple, d.addition))
        .collect();
    let expected: BTreeMap<TermTriple, bool> = [
        (t("a", "b", "a"), false),
        (t("a", "b", "g"), true),
        (t("a", "b", "z"), false),
    ]
    .into_iter()
    .collect();
    assert_eq!(directions, expected);
    assert_eq!(
        store.count_delta_materialized(&pattern, 0, None).expect("count"),
        Count::exact(3)
    );
}

#[test]
fn delta_range_is_validated() {
    let (_dir, store) = store();
    let any = TriplePattern::any();
    assert!(matches!(
        store.search_delta_materialized(&any, 0, 0, 1, Some(1)),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.search_delta_materialized(&any, 0, 0, 2, Some(1)),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.search_delta_materialized(&any, 0, 0, 0, Some(5)),
        Err(StoreError::NotFound(_))
    ));
}

// =============================================================================
// VERSION INDEX
// =============================================================================

#[test]
fn version_index_lists_versions_per_triple() {
    let (_dir, store) = store();
    let result = store.search_version(&TriplePattern::any(), 0, 0).expect("vi");
    assert_eq!(result.count(), Count::exact(15));

    let versions: BTreeMap<TermTriple, Vec<Version>> = result
        .items
        .into_iter()
        .map(|v| (v.triple, v.versions))
        .collect();
    assert_eq!(versions.len(), 15);
    assert_eq!(versions[&t("a", "a", &lit("a"))], vec![0, 1, 2]);
    assert_eq!(versions[&t("a", "a", &lit("b"))], vec![0]);
    assert_eq!(versions[&t("a", "b", "a")], vec![0]);
    assert_eq!(versions[&t("a", "b", "c")], vec![0, 1, 2]);
    assert_eq!(versions[&t("a", "b", "z")], vec![0]);
    assert_eq!(versions[&t("c", "c", "c")], vec![0, 1, 2]);
    assert_eq!(versions[&t("a", "a", &lit("z"))], vec![1]);
    assert_eq!(versions[&t("a", "b", "g")], vec![1, 2]);
    assert_eq!(versions[&t("f", "f", "f")], vec![1]);
    assert_eq!(versions[&t("z", "z", "z")], vec![1, 2]);
    assert_eq!(versions[&t("f", "r", "s")], vec![2]);
    assert_eq!(versions[&t("q", "q", "q")], vec![2]);
    assert_eq!(versions[&t("r", "r", "r")], vec![2]);
}

#[test]
fn version_index_with_bound_terms() {
    let (_dir, store) = store();
    let z = store
        .search_version(&TriplePattern::new("z", "z", "z"), 0, 0)
        .expect("vi");
    assert_eq!(z.items.len(), 1);
    assert_eq!(z.items[0].versions, vec![1, 2]);

    let object_f = store
        .search_version(&TriplePattern::any().with_object("f"), 0, 0)
        .expect("vi");
    assert_eq!(object_f.count(), Count::exact(2));

    assert_eq!(
        store
            .count_version(&TriplePattern::any().with_subject("a"))
            .expect("count"),
        Count::exact(9)
    );
}

// =============================================================================
// PERSISTENCE
// =============================================================================

#[test]
fn reopened_archive_answers_identically() {
    let (dir, store) = store();
    let before = store.search_version(&TriplePattern::any(), 0, 0).expect("vi");
    store.close(false).expect("close");

    let reopened =
        OstrichStore::open(dir.path().join("archive"), StoreOptions::read_only()).expect("reopen");
    assert_eq!(reopened.max_version().expect("max"), 2);
    let after = reopened.search_version(&TriplePattern::any(), 0, 0).expect("vi");
    assert_eq!(before, after);
    assert_eq!(reopened.patch(1).expect("patch").len(), 7);
}

#[test]
fn metadata_summarizes_the_chain() {
    let (_dir, store) = store();
    let metadata = store.metadata().expect("metadata");
    assert_eq!(metadata.max_version, 2);
    assert_eq!(metadata.snapshot_triples, 8);
    assert_eq!(metadata.latest_triples, 10);
    assert_eq!(metadata.distinct_triples, Count::exact(15));
    assert_eq!(metadata.versions.len(), 3);
    assert_eq!(metadata.versions[1].additions, 4);
    assert_eq!(metadata.versions[1].deletions, 3);
}
