//! Ledger entries and timestamps

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::{compute_checksum, Checksum};
use crate::error::{LedgerError, LedgerResult};
use crate::factor::FactorVector;
use crate::key::CompositeKey;

/// Newest timestamp handed out by [`Timestamp::now`]
static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Wall-clock instant in microseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time, never earlier than any previous `now()`.
    ///
    /// If the system clock steps backwards the last issued value is repeated
    /// until the clock catches up.
    pub fn now() -> Self {
        let micros = Utc::now().timestamp_micros().max(0) as u64;
        Self::issue(&LAST_ISSUED, micros)
    }

    fn issue(last: &AtomicU64, wall: u64) -> Self {
        let prev = last.fetch_max(wall, Ordering::AcqRel);
        Timestamp(prev.max(wall))
    }

    /// Build from raw microseconds
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Raw microseconds
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Seconds with sub-second fraction
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Utc.timestamp_micros(self.0 as i64).single() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}us", self.0),
        }
    }
}

/// One ledger record: key, text payload, factor vector and integrity data.
///
/// Fields are private. The checksum is always derived from the current
/// factors and text, so an entry cannot be built with a stale checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    key: CompositeKey,
    text: String,
    factors: FactorVector,
    created_at: Timestamp,
    checksum: Checksum,
}

impl LedgerEntry {
    /// New entry stamped with the current time
    pub fn new(key: CompositeKey, text: impl Into<String>, factors: FactorVector) -> Self {
        Self::with_timestamp(key, text, factors, Timestamp::now())
    }

    /// New entry with an explicit creation time
    pub fn with_timestamp(
        key: CompositeKey,
        text: impl Into<String>,
        factors: FactorVector,
        created_at: Timestamp,
    ) -> Self {
        let text = text.into();
        let checksum = compute_checksum(&factors, &text);
        Self {
            key,
            text,
            factors,
            created_at,
            checksum,
        }
    }

    /// Reassemble an entry from stored parts, verifying the stored checksum.
    pub fn from_parts(
        key: CompositeKey,
        text: String,
        factors: FactorVector,
        created_at: Timestamp,
        stored: Checksum,
    ) -> LedgerResult<Self> {
        factors.validate()?;
        let entry = Self::with_timestamp(key, text, factors, created_at);
        if entry.checksum != stored {
            return Err(LedgerError::ChecksumMismatch {
                key: entry.key.to_string(),
                expected: stored.to_hex(),
                actual: entry.checksum.to_hex(),
            });
        }
        Ok(entry)
    }

    /// Same key, text and creation time with a different factor vector
    pub fn with_factors(&self, factors: FactorVector) -> Self {
        Self::with_timestamp(self.key.clone(), self.text.clone(), factors, self.created_at)
    }

    /// Entry key
    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    /// Raw text payload
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Factor vector
    pub fn factors(&self) -> &FactorVector {
        &self.factors
    }

    /// Creation time
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Checksum over factors and text
    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Recompute the checksum from the current contents
    pub fn recompute_checksum(&self) -> Checksum {
        compute_checksum(&self.factors, &self.text)
    }
}
