//! WAL (Write-Ahead Log) module
//!
//! - `mode`: fsync policy (DurabilityMode)
//! - `record`: on-disk framing (length + CRC32 + bincode payload)
//! - `reader`: scan and validate a log file (WalReadResult)
//! - `writer`: append-only log implementing the storage journal (WAL)

pub mod mode;
pub mod reader;
pub mod record;
pub mod writer;

use qpledger_core::LedgerError;
use thiserror::Error;

pub use mode::DurabilityMode;
pub use reader::{WalCorruptionInfo, WalReadResult};
pub use writer::WAL;

/// Default file name of the log inside `<db>/wal/`
pub const WAL_FILE_NAME: &str = "ledger.wal";

/// Failures inside the WAL
#[derive(Debug, Error)]
pub enum WalError {
    /// File system failure
    #[error("wal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("wal encode error: {0}")]
    Encode(String),

    /// An earlier failed append could not be rolled back; reopen the log
    #[error("wal is poisoned by a failed rollback")]
    Poisoned,
}

impl From<WalError> for LedgerError {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(io) => LedgerError::storage(io.to_string()),
            WalError::Encode(reason) => LedgerError::storage(reason),
            poisoned @ WalError::Poisoned => LedgerError::storage(poisoned.to_string()),
        }
    }
}
