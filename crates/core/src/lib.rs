//! Core types for qpledger
//!
//! This crate defines the vocabulary shared by every other crate:
//! - `CompositeKey`: `(namespace, identifier)` addressing with a strict codec
//! - `FactorVector`: sparse deltas over the fixed prime slot alphabet
//! - `LedgerEntry`: the stored record, with its derived checksum
//! - `Checksum`: SHA-256 Merkle root over factors and text
//! - `LedgerError`: the error taxonomy
//!
//! Nothing here performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod checksum;
pub mod entry;
pub mod error;
pub mod factor;
pub mod key;

pub use cancel::CancelToken;
pub use checksum::{compute_checksum, Checksum};
pub use entry::{LedgerEntry, Timestamp};
pub use error::{LedgerError, LedgerResult};
pub use factor::{slot_index, FactorVector, SLOT_COUNT, SLOT_PRIMES};
pub use key::CompositeKey;
