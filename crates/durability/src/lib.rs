//! Durability layer
//!
//! Write-ahead log for the partitioned store. Every applied batch becomes one
//! framed record; on open the log is replayed to rebuild the in-memory
//! partitions.

#![warn(missing_docs)]

pub mod wal;

pub use wal::{DurabilityMode, WalCorruptionInfo, WalError, WalReadResult, WAL};
