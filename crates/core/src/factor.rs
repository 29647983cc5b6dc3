//! Factor vectors over the fixed prime slot alphabet
//!
//! A [`FactorVector`] is a sparse map from slot prime to delta. Missing primes
//! read as `0.0`, and setting a prime to zero removes it, so there is exactly
//! one representation for every vector. That canonical form is what the
//! checksum is computed over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Slot alphabet. Order here is the slot order used by packing.
pub const SLOT_PRIMES: [u32; 8] = [2, 3, 5, 7, 11, 13, 17, 19];

/// Number of slots in the alphabet
pub const SLOT_COUNT: usize = SLOT_PRIMES.len();

/// Position of `prime` in [`SLOT_PRIMES`], if it is a slot prime.
#[inline]
pub fn slot_index(prime: u32) -> Option<usize> {
    SLOT_PRIMES.iter().position(|&p| p == prime)
}

/// Check a single `(prime, delta)` pair.
pub fn validate_factor(prime: u32, delta: f64) -> LedgerResult<()> {
    if slot_index(prime).is_none() {
        return Err(LedgerError::invalid_factor(format!(
            "Prime {prime} is not in the slot alphabet {SLOT_PRIMES:?}"
        )));
    }
    if !delta.is_finite() {
        return Err(LedgerError::invalid_factor(format!(
            "Delta for prime {prime} must be finite, got {delta}"
        )));
    }
    Ok(())
}

/// Sparse `(prime, delta)` vector with pairwise distinct primes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorVector {
    slots: BTreeMap<u32, f64>,
}

impl FactorVector {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit pairs.
    ///
    /// Rejects unknown primes, non-finite deltas, and a prime listed twice.
    pub fn from_pairs<I>(pairs: I) -> LedgerResult<Self>
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        let mut seen = [false; SLOT_COUNT];
        let mut vector = FactorVector::new();
        for (prime, delta) in pairs {
            validate_factor(prime, delta)?;
            let idx = slot_index(prime).unwrap_or_default();
            if seen[idx] {
                return Err(LedgerError::invalid_factor(format!(
                    "Prime {prime} appears more than once"
                )));
            }
            seen[idx] = true;
            vector.insert(prime, delta);
        }
        Ok(vector)
    }

    /// Build from a dense slot array in [`SLOT_PRIMES`] order.
    pub fn from_slots(values: [f64; SLOT_COUNT]) -> LedgerResult<Self> {
        FactorVector::from_pairs(SLOT_PRIMES.iter().copied().zip(values))
    }

    /// Set the delta for `prime`, overwriting any previous value.
    pub fn set(&mut self, prime: u32, delta: f64) -> LedgerResult<()> {
        validate_factor(prime, delta)?;
        self.insert(prime, delta);
        Ok(())
    }

    fn insert(&mut self, prime: u32, delta: f64) {
        if delta == 0.0 {
            self.slots.remove(&prime);
        } else {
            self.slots.insert(prime, delta);
        }
    }

    /// Delta for `prime`, `0.0` when absent
    pub fn get(&self, prime: u32) -> f64 {
        self.slots.get(&prime).copied().unwrap_or(0.0)
    }

    /// Dense slot array in [`SLOT_PRIMES`] order
    pub fn to_slots(&self) -> [f64; SLOT_COUNT] {
        let mut out = [0.0; SLOT_COUNT];
        for (i, prime) in SLOT_PRIMES.iter().enumerate() {
            out[i] = self.get(*prime);
        }
        out
    }

    /// Non-zero pairs in ascending prime order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.slots.iter().map(|(p, d)| (*p, *d))
    }

    /// Number of non-zero slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when every slot is zero
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Re-check invariants on a vector that came from decoded bytes.
    pub fn validate(&self) -> LedgerResult<()> {
        for (prime, delta) in self.iter() {
            validate_factor(prime, delta)?;
            if delta == 0.0 {
                return Err(LedgerError::invalid_factor(format!(
                    "Prime {prime} stored with an explicit zero delta"
                )));
            }
        }
        Ok(())
    }

    /// Component-wise comparison with an absolute tolerance
    pub fn approx_eq(&self, other: &FactorVector, tolerance: f64) -> bool {
        self.to_slots()
            .iter()
            .zip(other.to_slots().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}
