//! Read-back validation for read-modify-write
//!
//! After a rotate writes its result, the entry is read again and compared
//! with what the writer expected to have stored. A difference means some
//! other writer got in between (a lost update) or the stored bytes no longer
//! match their checksum.
//!
//! Key rules:
//! - The write sequence number identifies *which* write is visible
//! - The checksum identifies *what* content is visible
//! - Any conflict is reported as `ChecksumMismatch`; the caller retries the
//!   whole operation, the stored entry is never patched in place

use qpledger_core::{Checksum, LedgerError, LedgerResult};

/// What a writer stored, or what a reader observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readback {
    /// Encoded composite key
    pub key: String,
    /// Sequence number of the write that produced the entry
    pub seq: u64,
    /// Checksum of the entry
    pub checksum: Checksum,
}

/// Types of conflicts found on read-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// The entry disappeared after the write
    Missing {
        /// Key that was written
        key: String,
    },

    /// A later write replaced ours before the read-back
    LostUpdate {
        /// Key that was written
        key: String,
        /// Sequence number of our write
        written_seq: u64,
        /// Sequence number currently visible
        observed_seq: u64,
    },

    /// The visible content differs from what was written
    ChecksumDrift {
        /// Key that was written
        key: String,
        /// Checksum we wrote
        expected: Checksum,
        /// Checksum now visible
        actual: Checksum,
    },
}

impl ConflictType {
    fn into_error(self) -> LedgerError {
        match self {
            ConflictType::Missing { key } => LedgerError::not_found(key),
            ConflictType::LostUpdate {
                key,
                written_seq,
                observed_seq,
            } => LedgerError::ChecksumMismatch {
                key,
                expected: format!("seq {written_seq}"),
                actual: format!("seq {observed_seq}"),
            },
            ConflictType::ChecksumDrift {
                key,
                expected,
                actual,
            } => LedgerError::ChecksumMismatch {
                key,
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            },
        }
    }
}

/// Result of read-back validation
///
/// Accumulates all conflicts found. The write is confirmed only if
/// is_valid() returns true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// No conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// A single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// `Ok(())` when valid, else the first conflict as an error
    pub fn into_result(self) -> LedgerResult<()> {
        match self.conflicts.into_iter().next() {
            None => Ok(()),
            Some(conflict) => Err(conflict.into_error()),
        }
    }
}

/// Compare what was written with what a fresh read observes
pub fn validate_readback(written: &Readback, observed: Option<&Readback>) -> ValidationResult {
    let Some(observed) = observed else {
        return ValidationResult::conflict(ConflictType::Missing {
            key: written.key.clone(),
        });
    };

    let mut result = ValidationResult::ok();
    if observed.seq != written.seq {
        result.conflicts.push(ConflictType::LostUpdate {
            key: written.key.clone(),
            written_seq: written.seq,
            observed_seq: observed.seq,
        });
    }
    if observed.checksum != written.checksum {
        result.conflicts.push(ConflictType::ChecksumDrift {
            key: written.key.clone(),
            expected: written.checksum,
            actual: observed.checksum,
        });
    }
    result
}
