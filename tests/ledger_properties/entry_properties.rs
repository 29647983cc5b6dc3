//! Write/read round-trip and checksum integrity

use proptest::prelude::*;
use qpledger::storage::Partition;
use qpledger::compute_checksum;
use qpledger::LedgerError;

use crate::test_utils::{arb_entry, bare_ledger, cache_db, entry, key};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_read_returns_what_was_written(e in arb_entry()) {
        let db = cache_db();
        let checksum = db.write(&e).unwrap();
        let read = db.read(e.key()).unwrap();
        prop_assert_eq!(&read, &e);
        prop_assert_eq!(read.checksum(), checksum);
    }

    #[test]
    fn prop_stored_bytes_reproduce_write_checksum(e in arb_entry()) {
        let db = cache_db();
        let checksum = db.write(&e).unwrap();
        let read = db.read(e.key()).unwrap();
        prop_assert_eq!(compute_checksum(read.factors(), read.text()), checksum);
    }
}

#[test]
fn test_read_missing_is_not_found() {
    let db = cache_db();
    assert!(matches!(
        db.read(&key("people:ghost")),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_tampered_text_is_detected() {
    let (store, ledger) = bare_ledger();
    let e = entry("people:priya", "met priya nyc");
    ledger.write(&e).unwrap();
    store
        .put(Partition::R, &e.key().encode(), b"met priya berlin")
        .unwrap();
    assert!(matches!(
        ledger.read(e.key()),
        Err(LedgerError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_invalid_keys_rejected_at_boundary() {
    for bad in ["", ":x", "ns:", "a:b:c", "nocolon"] {
        assert!(
            matches!(bad.parse::<qpledger::CompositeKey>(), Err(LedgerError::InvalidKey { .. })),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn test_invalid_factors_rejected() {
    use qpledger::FactorVector;
    assert!(matches!(
        FactorVector::from_pairs([(4, 1.0)]),
        Err(LedgerError::InvalidFactor { .. })
    ));
    assert!(matches!(
        FactorVector::from_pairs([(5, 1.0), (5, 2.0)]),
        Err(LedgerError::InvalidFactor { .. })
    ));
    assert!(matches!(
        FactorVector::from_pairs([(5, f64::NAN)]),
        Err(LedgerError::InvalidFactor { .. })
    ));
}
