//! Rotation identity and round-trip

use proptest::prelude::*;
use qpledger::LedgerError;

use crate::test_utils::{arb_entry, cache_db, entry, key};

fn arb_axis() -> impl Strategy<Value = [f64; 3]> {
    proptest::array::uniform3(-1.0f64..1.0)
        .prop_filter("axis must be non-degenerate", |a| a.iter().map(|x| x * x).sum::<f64>() > 1e-3)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_zero_angle_is_identity(e in arb_entry(), axis in arb_axis()) {
        let db = cache_db();
        db.write(&e).unwrap();
        let r = db.rotate(e.key(), axis, 0.0).unwrap();
        prop_assert_eq!(r.original_checksum, r.rotated_checksum);
        prop_assert_eq!(r.energy_cycles, 0.0);
        let read_back = db.read(e.key()).unwrap();
        prop_assert_eq!(read_back.factors(), e.factors());
    }

    #[test]
    fn prop_rotate_then_inverse_restores(e in arb_entry(), axis in arb_axis(), angle in -6.3f64..6.3) {
        let db = cache_db();
        db.write(&e).unwrap();
        db.rotate(e.key(), axis, angle).unwrap();
        db.rotate(e.key(), axis, -angle).unwrap();
        let restored = db.read(e.key()).unwrap();
        let scale = e.factors().iter().map(|(_, d)| d.abs()).fold(1.0, f64::max);
        prop_assert!(restored.factors().approx_eq(e.factors(), 1e-9 * scale));
        prop_assert_eq!(restored.text(), e.text());
    }
}

#[test]
fn test_rotation_reports_energy() {
    let db = cache_db();
    let e = entry("people:priya", "met priya nyc");
    db.write(&e).unwrap();
    let r = db.rotate(e.key(), [1.0, 0.0, 0.0], std::f64::consts::FRAC_PI_2).unwrap();
    assert_ne!(r.original_checksum, r.rotated_checksum);
    assert!(r.energy_cycles > 0.0);
    assert_eq!(db.read(e.key()).unwrap().checksum(), r.rotated_checksum);
}

#[test]
fn test_rotate_missing_key() {
    let db = cache_db();
    assert!(matches!(
        db.rotate(&key("people:ghost"), [0.0, 0.0, 1.0], 1.0),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_rotate_rejects_bad_parameters() {
    let db = cache_db();
    let e = entry("people:priya", "x");
    db.write(&e).unwrap();
    for (axis, angle) in [([0.0, 0.0, 0.0], 1.0), ([f64::NAN, 0.0, 1.0], 1.0), ([0.0, 0.0, 1.0], f64::INFINITY)] {
        assert!(matches!(
            db.rotate(e.key(), axis, angle),
            Err(LedgerError::InvalidRotation { .. })
        ));
    }
    assert_eq!(db.read(e.key()).unwrap(), e);
}
