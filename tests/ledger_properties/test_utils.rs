//! Shared strategies and fixtures

use std::sync::Arc;

use proptest::prelude::*;
use qpledger::concurrency::KeyLockTable;
use qpledger::engine::LedgerManager;
use qpledger::storage::{MergeAccumulator, PartitionedStore};
use qpledger::{CompositeKey, Database, FactorVector, LedgerEntry, Timestamp};

/// Fresh in-memory database
pub fn cache_db() -> Database {
    Database::cache()
}

/// Ledger manager over a bare store, for tests that poke partitions directly
pub fn bare_ledger() -> (Arc<PartitionedStore>, LedgerManager) {
    let store = Arc::new(PartitionedStore::new(MergeAccumulator::default()));
    let ledger = LedgerManager::new(Arc::clone(&store), Arc::new(KeyLockTable::new()), 64 * 1024);
    (store, ledger)
}

pub fn key(s: &str) -> CompositeKey {
    s.parse().unwrap()
}

pub fn entry(k: &str, text: &str) -> LedgerEntry {
    LedgerEntry::new(
        key(k),
        text,
        FactorVector::from_pairs([(3, 1.5), (11, -2.0), (19, 0.25)]).unwrap(),
    )
}

pub fn arb_key() -> impl Strategy<Value = CompositeKey> {
    ("[a-z]{1,8}", "[A-Za-z0-9_.-]{1,12}")
        .prop_map(|(ns, id)| CompositeKey::new(ns, id).unwrap())
}

pub fn arb_factors() -> impl Strategy<Value = FactorVector> {
    proptest::collection::btree_map(
        proptest::sample::select(qpledger::SLOT_PRIMES.to_vec()),
        -1.0e6f64..1.0e6,
        0..=8,
    )
    .prop_map(|m| FactorVector::from_pairs(m).unwrap())
}

pub fn arb_entry() -> impl Strategy<Value = LedgerEntry> {
    (arb_key(), "\\PC{0,120}", arb_factors(), 0u64..4_000_000_000_000_000)
        .prop_map(|(k, text, factors, micros)| {
            LedgerEntry::with_timestamp(k, text, factors, Timestamp::from_micros(micros))
        })
}

/// Entries whose text is plain words, for token-level assertions
pub fn arb_worded_entry() -> impl Strategy<Value = LedgerEntry> {
    (arb_key(), proptest::collection::vec("[a-zA-Z]{1,6}", 0..8), arb_factors())
        .prop_map(|(k, words, factors)| LedgerEntry::new(k, words.join(", "), factors))
}
