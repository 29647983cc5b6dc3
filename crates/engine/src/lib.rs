//! Ledger engine
//!
//! Everything above raw storage:
//! - [`Database`]: opening, recovery and the top-level calls
//! - [`ledger`]: entry writes, reads and prefix listings
//! - [`transform`]: quaternion rotation of factor vectors
//! - [`search`]: the token-prime index
//! - [`ethics`]: merge-only counters
//! - [`config`]: per-database settings

#![warn(missing_docs)]

pub mod config;
pub mod database;
pub mod ethics;
pub mod ledger;
pub mod search;
pub mod transform;

pub use config::{LedgerConfig, CONFIG_FILE_NAME};
pub use database::Database;
pub use ethics::{EthicsLedger, Tally};
pub use ledger::{EntryPage, FactorMatch, LedgerManager, MetaRecord, WriteReceipt};
pub use search::{IndexSnapshot, IndexState, QueryMode, QueryResult, RebuildSummary, TokenPrimeIndex};
pub use transform::{FactorTransform, Quaternion, RotateResult};
