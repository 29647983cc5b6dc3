//! Counter merges: order, grouping and saturation

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use qpledger::storage::{decode_counter, MergeAccumulator, Partition, PartitionedStore};
use qpledger::{Database, LedgerConfig, LedgerError};

fn merged_value(ceiling: u64, deltas: &[u64]) -> u64 {
    let store = PartitionedStore::new(MergeAccumulator::new(ceiling));
    for d in deltas {
        store.merge(Partition::Ethics, b"c", *d).unwrap();
    }
    store
        .get(Partition::Ethics, b"c")
        .map(|raw| decode_counter(&raw).unwrap())
        .unwrap_or(0)
}

proptest! {
    #[test]
    fn prop_merge_order_independent(
        (deltas, shuffled) in proptest::collection::vec(0u64..1_000, 0..40)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
        ceiling in 1u64..20_000,
    ) {
        prop_assert_eq!(merged_value(ceiling, &deltas), merged_value(ceiling, &shuffled));
        prop_assert_eq!(merged_value(ceiling, &deltas), deltas.iter().sum::<u64>().min(ceiling));
    }

    #[test]
    fn prop_merge_grouping_independent(
        deltas in proptest::collection::vec(0u64..u64::MAX / 4, 1..20),
        split in 0usize..20,
    ) {
        let acc = MergeAccumulator::default();
        let split = split.min(deltas.len());
        let (left, right) = deltas.split_at(split);
        let grouped = acc.combine(acc.fold(left.iter().copied()), acc.fold(right.iter().copied())).value;
        prop_assert_eq!(grouped, acc.fold(deltas.iter().copied()));
    }
}

#[test]
fn test_concurrent_merges_sum_exactly() {
    let store = Arc::new(PartitionedStore::new(MergeAccumulator::default()));
    let handles: Vec<_> = (1..=8u64)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..500 {
                    store.merge(Partition::Ethics, b"shared", t).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let raw = store.get(Partition::Ethics, b"shared").unwrap();
    assert_eq!(decode_counter(&raw).unwrap(), 500 * (1..=8u64).sum::<u64>());
}

#[test]
fn test_overflow_saturates_with_signal() {
    let db = Database::cache_with_config(LedgerConfig {
        counter_ceiling: 100,
        ..LedgerConfig::cache()
    });
    assert_eq!(db.merge("budget", 60).unwrap(), 60);
    match db.merge("budget", 60) {
        Err(LedgerError::CounterOverflow { counter, ceiling }) => {
            assert_eq!(counter, "budget");
            assert_eq!(ceiling, 100);
        }
        other => panic!("expected CounterOverflow, got {other:?}"),
    }
    assert_eq!(db.ethics().counter("budget").unwrap(), 100);
    // A further positive delta still reports saturation, never wraps
    assert!(db.merge("budget", 1).is_err());
    assert_eq!(db.ethics().counter("budget").unwrap(), 100);
}

#[test]
fn test_merge_rejected_outside_counter_partition() {
    let store = PartitionedStore::new(MergeAccumulator::default());
    for partition in [Partition::Meta, Partition::R, Partition::Qp, Partition::Bridge, Partition::Index] {
        assert!(matches!(
            store.merge(partition, b"k", 1),
            Err(LedgerError::InvalidOperation { .. })
        ));
    }
}
