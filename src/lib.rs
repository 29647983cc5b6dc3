//! qpledger
//!
//! Embedded ledger store. Entries are `(namespace, identifier)`-keyed text
//! with a sparse prime-slot factor vector and a SHA-256 checksum, spread over
//! six partitions of one store:
//!
//! | Partition | Contents |
//! |-----------|----------|
//! | `meta`    | creation time, checksum, write sequence |
//! | `R`       | entry text |
//! | `Qp`      | factor vector |
//! | `bridge`  | write sequence → key change feed |
//! | `index`   | persisted token postings |
//! | `ethics`  | merge-only saturating counters |
//!
//! Start with [`Database::open`]:
//!
//! ```no_run
//! use qpledger::{CancelToken, Database, FactorVector, LedgerEntry, QueryMode};
//!
//! let db = Database::open("./ledger-data")?;
//! let key = "people:priya".parse()?;
//! let factors = FactorVector::from_pairs([(5, 2.0)])?;
//! db.write(&LedgerEntry::new(key, "met priya nyc", factors))?;
//! db.rebuild(&CancelToken::new())?;
//! let hits = db.query(["priya"], QueryMode::Any, 10)?;
//! assert_eq!(hits.keys.len(), 1);
//! # Ok::<(), qpledger::LedgerError>(())
//! ```

pub use qpledger_concurrency as concurrency;
pub use qpledger_durability as durability;
pub use qpledger_engine as engine;
pub use qpledger_storage as storage;

pub use qpledger_core::{
    compute_checksum, CancelToken, Checksum, CompositeKey, FactorVector, LedgerEntry, LedgerError,
    LedgerResult, Timestamp, SLOT_PRIMES,
};
pub use qpledger_durability::DurabilityMode;
pub use qpledger_engine::{
    Database, FactorMatch, LedgerConfig, QueryMode, QueryResult, RebuildSummary, RotateResult,
    Tally,
};
