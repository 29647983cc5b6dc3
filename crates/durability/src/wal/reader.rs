//! Log scanning and validation

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use qpledger_storage::JournalRecord;

use super::record::{decode_frame, FrameDecode};
use super::WalError;

/// Where and why a scan stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalCorruptionInfo {
    /// Offset of the first byte that is not part of a valid record
    pub offset: u64,
    /// Bytes from `offset` to end of file
    pub discarded_bytes: u64,
    /// Description of the damage
    pub reason: String,
}

/// Outcome of scanning a log file
#[derive(Debug, Clone, Default)]
pub struct WalReadResult {
    /// Valid records in file order
    pub records: Vec<JournalRecord>,
    /// Length of the valid prefix of the file
    pub valid_len: u64,
    /// Set when the file has a torn or damaged tail
    pub corruption: Option<WalCorruptionInfo>,
}

impl WalReadResult {
    /// Highest sequence number in the valid prefix
    pub fn last_seq(&self) -> u64 {
        self.records.iter().map(|r| r.seq).max().unwrap_or(0)
    }
}

/// Scan `path` from the start.
///
/// A missing file reads as empty. Scanning stops at the first incomplete or
/// damaged frame; everything after it is reported, never returned.
pub fn read_log(path: &Path) -> Result<WalReadResult, WalError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(WalReadResult::default()),
        Err(e) => return Err(e.into()),
    };
    Ok(scan(&bytes))
}

pub(crate) fn scan(bytes: &[u8]) -> WalReadResult {
    let mut result = WalReadResult::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        match decode_frame(&bytes[offset..]) {
            FrameDecode::Complete { record, frame_len } => {
                result.records.push(record);
                offset += frame_len;
            }
            FrameDecode::Incomplete => {
                result.corruption = Some(tail(offset, bytes.len(), "incomplete frame"));
                break;
            }
            FrameDecode::Corrupt(reason) => {
                result.corruption = Some(tail(offset, bytes.len(), &reason));
                break;
            }
        }
    }

    result.valid_len = offset as u64;
    result
}

fn tail(offset: usize, total: usize, reason: &str) -> WalCorruptionInfo {
    WalCorruptionInfo {
        offset: offset as u64,
        discarded_bytes: (total - offset) as u64,
        reason: reason.to_string(),
    }
}
