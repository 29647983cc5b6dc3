//! Merge accumulator for counter partitions
//!
//! Counters only grow: every delta is a non-negative `u64`, an absent value is
//! the identity `0`, and the result is `min(existing + delta, ceiling)`.
//!
//! With non-negative deltas, `min(sum, ceiling)` is associative and
//! commutative, so deltas applied in any order or grouping land on the same
//! value. Saturation is reported through [`MergeOutcome::saturated`] rather
//! than folded silently into a clamp.
//!
//! Stored counter values are 8 bytes, big-endian.

use byteorder::{BigEndian, ByteOrder};
use qpledger_core::{LedgerError, LedgerResult};

/// Width of an encoded counter value
pub const COUNTER_WIDTH: usize = 8;

/// Result of applying one delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Counter value after the merge
    pub value: u64,
    /// True when the merge hit the ceiling
    pub saturated: bool,
}

/// Saturating sum with a configurable ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeAccumulator {
    ceiling: u64,
}

impl Default for MergeAccumulator {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl MergeAccumulator {
    /// Accumulator saturating at `ceiling`
    pub const fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    /// Configured ceiling
    pub const fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Combine an existing value with `delta`.
    ///
    /// A delta that would carry the value past the ceiling, or any positive
    /// delta applied to a value already at the ceiling, reports saturation.
    #[inline]
    pub fn combine(&self, existing: u64, delta: u64) -> MergeOutcome {
        let existing = existing.min(self.ceiling);
        match existing.checked_add(delta) {
            Some(sum) if sum <= self.ceiling && !(delta > 0 && existing == self.ceiling) => {
                MergeOutcome {
                    value: sum,
                    saturated: false,
                }
            }
            _ => MergeOutcome {
                value: self.ceiling,
                saturated: true,
            },
        }
    }

    /// Apply `delta` to an encoded value (absent means zero).
    pub fn apply(&self, existing: Option<&[u8]>, delta: u64) -> LedgerResult<(Vec<u8>, MergeOutcome)> {
        let current = match existing {
            Some(bytes) => decode_counter(bytes)?,
            None => 0,
        };
        let outcome = self.combine(current, delta);
        Ok((encode_counter(outcome.value), outcome))
    }

    /// Fold a sequence of deltas starting from zero
    pub fn fold<I: IntoIterator<Item = u64>>(&self, deltas: I) -> u64 {
        deltas
            .into_iter()
            .fold(0, |acc, d| self.combine(acc, d).value)
    }
}

/// Encode a counter value
pub fn encode_counter(value: u64) -> Vec<u8> {
    let mut buf = vec![0u8; COUNTER_WIDTH];
    BigEndian::write_u64(&mut buf, value);
    buf
}

/// Decode a counter value
pub fn decode_counter(bytes: &[u8]) -> LedgerResult<u64> {
    if bytes.len() != COUNTER_WIDTH {
        return Err(LedgerError::corruption(format!(
            "counter value has {} bytes, expected {COUNTER_WIDTH}",
            bytes.len()
        )));
    }
    Ok(BigEndian::read_u64(bytes))
}
