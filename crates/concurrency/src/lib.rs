//! Concurrency control for ledger writes
//!
//! - [`KeyLockTable`]: per-key mutual exclusion for write/rotate, created on
//!   demand and reclaimed once uncontended
//! - [`validation`]: read-back checks that detect lost updates and corruption
//!   after a read-modify-write

#![warn(missing_docs)]

pub mod key_lock;
pub mod validation;

pub use key_lock::{KeyGuard, KeyLockTable};
pub use validation::{validate_readback, ConflictType, Readback, ValidationResult};
