//! Index rebuild idempotence and query semantics

use proptest::prelude::*;
use qpledger::{CancelToken, QueryMode};

use crate::test_utils::{arb_entry, arb_worded_entry, cache_db, entry, key};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_rebuild_is_idempotent(entries in proptest::collection::vec(arb_entry(), 0..30)) {
        let db = cache_db();
        for e in &entries {
            db.write(e).unwrap();
        }
        db.rebuild(&CancelToken::new()).unwrap();
        let first = db.index().snapshot();
        db.rebuild(&CancelToken::new()).unwrap();
        let second = db.index().snapshot();
        prop_assert_eq!(first.postings(), second.postings());
        prop_assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn prop_every_indexed_key_is_findable(entries in proptest::collection::vec(arb_worded_entry(), 1..20)) {
        let db = cache_db();
        for e in &entries {
            db.write(e).unwrap();
        }
        db.rebuild(&CancelToken::new()).unwrap();
        let snapshot = db.index().snapshot();
        for (token, keys) in snapshot.postings() {
            let hits = db.query([token.as_str()], QueryMode::Any, usize::MAX).unwrap();
            for k in keys {
                prop_assert!(hits.keys.contains(k));
            }
        }
    }
}

#[test]
fn test_query_example() {
    let db = cache_db();
    db.write(&entry("people:k1", "met priya nyc")).unwrap();
    db.write(&entry("people:k2", "met john sydney")).unwrap();
    db.rebuild(&CancelToken::new()).unwrap();

    let any = db.query(["met"], QueryMode::Any, 10).unwrap();
    assert_eq!(any.keys, vec![key("people:k1"), key("people:k2")]);

    let all = db.query(["met", "priya"], QueryMode::All, 10).unwrap();
    assert_eq!(all.keys, vec![key("people:k1")]);

    assert!(db.query(["berlin"], QueryMode::Any, 10).unwrap().keys.is_empty());
}

#[test]
fn test_ranking_by_match_count_then_key() {
    let db = cache_db();
    db.write(&entry("t:c", "red green blue")).unwrap();
    db.write(&entry("t:a", "red")).unwrap();
    db.write(&entry("t:b", "green red")).unwrap();
    db.write(&entry("t:d", "green")).unwrap();
    db.rebuild(&CancelToken::new()).unwrap();

    let r = db.query(["red", "green", "blue"], QueryMode::Any, 10).unwrap();
    assert_eq!(r.keys, vec![key("t:c"), key("t:b"), key("t:a"), key("t:d")]);

    let r = db.query(["red", "green", "blue"], QueryMode::Any, 2).unwrap();
    assert_eq!(r.keys, vec![key("t:c"), key("t:b")]);
}

#[test]
fn test_query_tokens_normalized_like_text() {
    let db = cache_db();
    db.write(&entry("people:k1", "Met Priya, NYC!")).unwrap();
    db.rebuild(&CancelToken::new()).unwrap();
    let r = db.query(["PRIYA", "nyc."], QueryMode::All, 10).unwrap();
    assert_eq!(r.keys, vec![key("people:k1")]);
}

#[test]
fn test_index_is_derived_only() {
    let db = cache_db();
    db.write(&entry("people:k1", "met priya nyc")).unwrap();
    db.rebuild(&CancelToken::new()).unwrap();
    let digest = db.index().snapshot().digest();

    // Counter traffic and index persistence never make the snapshot stale
    db.merge("unrelated", 5).unwrap();
    assert!(!db.index().is_stale().unwrap());

    db.write(&entry("people:k1", "met priya berlin")).unwrap();
    assert!(db.index().is_stale().unwrap());
    db.rebuild(&CancelToken::new()).unwrap();
    assert_ne!(db.index().snapshot().digest(), digest);
    assert_eq!(
        db.query(["berlin"], QueryMode::Any, 10).unwrap().keys,
        vec![key("people:k1")]
    );
    assert!(db.query(["nyc"], QueryMode::Any, 10).unwrap().keys.is_empty());
}
