//! Prefix scans: byte order, limits and cursors

use proptest::prelude::*;
use qpledger::storage::{MergeAccumulator, Partition, PartitionedStore};

use crate::test_utils::{bare_ledger, cache_db, entry};

#[test]
fn test_prefix_scan_is_byte_ordered() {
    let db = cache_db();
    for k in ["a:2", "a:10", "a:1", "b:1"] {
        db.write(&entry(k, "x")).unwrap();
    }
    let keys: Vec<String> = db
        .list_by_prefix("a:", 10)
        .unwrap()
        .iter()
        .map(|e| e.key().to_string())
        .collect();
    assert_eq!(keys, vec!["a:1", "a:10", "a:2"]);
}

#[test]
fn test_list_respects_limit() {
    let db = cache_db();
    for i in 0..10 {
        db.write(&entry(&format!("n:{i}"), "x")).unwrap();
    }
    assert_eq!(db.list_by_prefix("n:", 3).unwrap().len(), 3);
    assert!(db.list_by_prefix("n:", 0).unwrap().is_empty());
    assert!(db.list_by_prefix("zzz", 10).unwrap().is_empty());
}

#[test]
fn test_list_pages_resume_after_cursor() {
    let (_, ledger) = bare_ledger();
    for i in 0..7 {
        ledger.write(&entry(&format!("p:{i}"), "x")).unwrap();
    }
    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = ledger.list_page("p:", 3, cursor.as_ref()).unwrap();
        seen.extend(page.entries.iter().map(|e| e.key().to_string()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen, (0..7).map(|i| format!("p:{i}")).collect::<Vec<_>>());
}

proptest! {
    #[test]
    fn prop_paged_scan_matches_full_scan(
        keys in proptest::collection::btree_set("[a-c]{1,4}", 1..60),
        page in 1usize..8,
    ) {
        let store = PartitionedStore::new(MergeAccumulator::default());
        for k in &keys {
            store.put(Partition::R, k.as_bytes(), b"v").unwrap();
        }

        let full = store.scan_prefix(Partition::R, b"a", usize::MAX, None).entries;
        let mut paged = Vec::new();
        let mut after: Option<Vec<u8>> = None;
        loop {
            let p = store.scan_prefix(Partition::R, b"a", page, after.as_deref());
            paged.extend(p.entries);
            match p.next_cursor {
                Some(c) => after = Some(c),
                None => break,
            }
        }
        prop_assert_eq!(&paged, &full);

        let expected: Vec<Vec<u8>> = keys
            .iter()
            .filter(|k| k.starts_with('a'))
            .map(|k| k.as_bytes().to_vec())
            .collect();
        let got: Vec<Vec<u8>> = full.into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(got, expected);
    }
}
