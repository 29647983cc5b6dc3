//! Factor rotation
//!
//! The eight slot deltas are packed into two quaternions by a fixed mapping:
//!
//! ```text
//! Ψ₁ = (w, x, y, z) ← primes ( 2,  3,  5,  7)
//! Ψ₂ = (w, x, y, z) ← primes (11, 13, 17, 19)
//! ```
//!
//! Both are conjugated by the rotation quaternion `q` (`q · Ψ · q⁻¹`) and
//! unpacked through the same mapping. Packing does not normalize, so a
//! zero-angle rotation returns the stored deltas unchanged.
//!
//! # Write-back
//!
//! rotate holds the key's lock for the whole read-modify-write, verifies the
//! stored checksum before transforming, keeps `created_at`, and re-reads the
//! entry after writing. A read-back that disagrees with what was written is
//! reported as `ChecksumMismatch` for the caller to retry.

use std::sync::Arc;

use qpledger_concurrency::{validate_readback, Readback};
use qpledger_core::{Checksum, CompositeKey, FactorVector, LedgerResult, SLOT_COUNT};
use tracing::{debug, warn};

use super::quaternion::Quaternion;
use crate::ledger::LedgerManager;

/// Primes packed into Ψ₁ as (w, x, y, z)
pub const PSI1_PRIMES: [u32; 4] = [2, 3, 5, 7];

/// Primes packed into Ψ₂ as (w, x, y, z)
pub const PSI2_PRIMES: [u32; 4] = [11, 13, 17, 19];

/// Outcome of one rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateResult {
    /// Checksum before the rotation
    pub original_checksum: Checksum,
    /// Checksum of the rotated entry as stored
    pub rotated_checksum: Checksum,
    /// Σ (new − old)² over all eight components
    pub energy_cycles: f64,
    /// Sequence number of the write-back
    pub seq: u64,
}

/// Pack a factor vector into (Ψ₁, Ψ₂)
pub fn pack(factors: &FactorVector) -> (Quaternion, Quaternion) {
    let take = |primes: [u32; 4]| Quaternion::from_array(primes.map(|p| factors.get(p)));
    (take(PSI1_PRIMES), take(PSI2_PRIMES))
}

/// Unpack (Ψ₁, Ψ₂) into a factor vector
pub fn unpack(psi1: Quaternion, psi2: Quaternion) -> LedgerResult<FactorVector> {
    let mut slots = [0.0; SLOT_COUNT];
    for (i, (p, v)) in PSI1_PRIMES
        .iter()
        .zip(psi1.to_array())
        .chain(PSI2_PRIMES.iter().zip(psi2.to_array()))
        .enumerate()
    {
        debug_assert_eq!(qpledger_core::slot_index(*p), Some(i));
        slots[i] = v;
    }
    FactorVector::from_slots(slots)
}

/// Rotate a vector by `q`, returning the result and its energy change
pub fn rotate_factors(factors: &FactorVector, q: Quaternion) -> LedgerResult<(FactorVector, f64)> {
    let (psi1, psi2) = pack(factors);
    let rotated = unpack(q.conjugate_apply(psi1), q.conjugate_apply(psi2))?;

    let energy = factors
        .to_slots()
        .iter()
        .zip(rotated.to_slots())
        .map(|(old, new)| (new - old) * (new - old))
        .sum();
    Ok((rotated, energy))
}

/// Applies rotations to stored entries
pub struct FactorTransform {
    ledger: Arc<LedgerManager>,
}

impl FactorTransform {
    /// Transform writing through `ledger`
    pub fn new(ledger: Arc<LedgerManager>) -> Self {
        Self { ledger }
    }

    /// Rotate the factor vector of `key` by `angle` radians about `axis`.
    ///
    /// # Errors
    ///
    /// - `InvalidRotation` for a zero or non-finite axis or a non-finite angle
    /// - `NotFound` when no entry exists
    /// - `ChecksumMismatch` when the stored entry fails verification or the
    ///   read-back disagrees with the write
    pub fn rotate(&self, key: &CompositeKey, axis: [f64; 3], angle: f64) -> LedgerResult<RotateResult> {
        let q = Quaternion::from_axis_angle(axis, angle)?;

        let encoded = key.encode();
        let _guard = self.ledger.locks().lock(&encoded);

        let entry = self.ledger.read(key)?;
        let original_checksum = entry.checksum();
        let (factors, energy_cycles) = rotate_factors(entry.factors(), q)?;
        let rotated = entry.with_factors(factors);

        let receipt = self.ledger.write_unlocked(&rotated)?;
        let written = Readback {
            key: key.to_string(),
            seq: receipt.seq,
            checksum: rotated.checksum(),
        };
        let observed = self.ledger.readback(key)?;
        if let Err(e) = validate_readback(&written, observed.as_ref()).into_result() {
            warn!(target: "qpledger::rotate", key = %key, error = %e, "Rotation read-back failed");
            return Err(e);
        }

        debug!(
            target: "qpledger::rotate",
            key = %key,
            angle,
            energy_cycles,
            original = %original_checksum,
            rotated = %receipt.checksum,
            "Entry rotated"
        );
        Ok(RotateResult {
            original_checksum,
            rotated_checksum: receipt.checksum,
            energy_cycles,
            seq: receipt.seq,
        })
    }
}

impl std::fmt::Debug for FactorTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorTransform").finish_non_exhaustive()
    }
}
