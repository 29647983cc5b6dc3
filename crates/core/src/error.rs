//! Error taxonomy for the ledger core
//!
//! Every fallible operation in the workspace returns [`LedgerResult`].
//! Validation errors (`InvalidKey`, `InvalidFactor`, `InvalidText`,
//! `InvalidRotation`) are raised before any mutation, so a failed call never
//! leaves a partial write behind.
//!
//! `StorageUnavailable` carries I/O failures unchanged to the caller. The core
//! never retries; retry policy belongs to whoever called it.

use thiserror::Error;

/// Result alias used across the workspace
pub type LedgerResult<T> = Result<T, LedgerError>;

/// All failure kinds surfaced by the ledger core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Namespace or identifier violates the key encoding rules
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong with the key
        reason: String,
    },

    /// A prime is outside the slot alphabet, appears twice, or carries a
    /// non-finite delta
    #[error("invalid factor: {reason}")]
    InvalidFactor {
        /// What was wrong with the factor
        reason: String,
    },

    /// Entry text exceeds the configured cap
    #[error("invalid text: {reason}")]
    InvalidText {
        /// What was wrong with the text
        reason: String,
    },

    /// Rotation axis or angle is unusable
    #[error("invalid rotation: {reason}")]
    InvalidRotation {
        /// What was wrong with the rotation parameters
        reason: String,
    },

    /// No entry stored under the key
    #[error("not found: {key}")]
    NotFound {
        /// Encoded key that was looked up
        key: String,
    },

    /// Stored or read-back checksum disagrees with the recomputed one.
    ///
    /// Signals corruption or a lost update. Callers retry the whole
    /// operation; the stored entry is never patched in place.
    #[error("checksum mismatch for {key}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// Encoded key of the entry
        key: String,
        /// Checksum the operation expected
        expected: String,
        /// Checksum actually observed
        actual: String,
    },

    /// Counter reached its ceiling; the stored value is saturated
    #[error("counter {counter} saturated at {ceiling}")]
    CounterOverflow {
        /// Counter name
        counter: String,
        /// Ceiling the counter was clamped to
        ceiling: u64,
    },

    /// Operation is not allowed on the target (e.g. merge on a non-counter
    /// partition)
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was refused
        reason: String,
    },

    /// A rebuild is already running
    #[error("index rebuild already in progress")]
    IndexBuilding,

    /// The operation observed its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying storage failed (I/O, fsync, journal append)
    #[error("storage unavailable: {reason}")]
    StorageUnavailable {
        /// Underlying failure
        reason: String,
    },

    /// Stored bytes could not be decoded
    #[error("corruption: {reason}")]
    Corruption {
        /// What failed to decode
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("config error: {reason}")]
    Config {
        /// What was wrong with the configuration
        reason: String,
    },
}

impl LedgerError {
    /// Build an `InvalidKey` error
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        LedgerError::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidFactor` error
    pub fn invalid_factor(reason: impl Into<String>) -> Self {
        LedgerError::InvalidFactor {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidText` error
    pub fn invalid_text(reason: impl Into<String>) -> Self {
        LedgerError::InvalidText {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidRotation` error
    pub fn invalid_rotation(reason: impl Into<String>) -> Self {
        LedgerError::InvalidRotation {
            reason: reason.into(),
        }
    }

    /// Build an `InvalidOperation` error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        LedgerError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Build a `NotFound` error
    pub fn not_found(key: impl ToString) -> Self {
        LedgerError::NotFound {
            key: key.to_string(),
        }
    }

    /// Build a `StorageUnavailable` error
    pub fn storage(reason: impl Into<String>) -> Self {
        LedgerError::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Build a `Corruption` error
    pub fn corruption(reason: impl Into<String>) -> Self {
        LedgerError::Corruption {
            reason: reason.into(),
        }
    }

    /// Build a `Config` error
    pub fn config(reason: impl Into<String>) -> Self {
        LedgerError::Config {
            reason: reason.into(),
        }
    }

    /// True for errors raised by input validation before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidKey { .. }
                | LedgerError::InvalidFactor { .. }
                | LedgerError::InvalidText { .. }
                | LedgerError::InvalidRotation { .. }
                | LedgerError::InvalidOperation { .. }
        )
    }

    /// True when the caller should retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ChecksumMismatch { .. })
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        LedgerError::storage(e.to_string())
    }
}
