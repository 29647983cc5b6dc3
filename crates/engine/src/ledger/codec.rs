//! Value encodings for the entry partitions
//!
//! - `R`: raw UTF-8 text bytes
//! - `Qp`: MessagePack of the [`FactorVector`]
//! - `meta`: MessagePack of [`MetaRecord`]
//! - `index` factor postings: the slot delta as big-endian `f64` bits

use byteorder::{BigEndian, ByteOrder};
use qpledger_core::{Checksum, FactorVector, LedgerError, LedgerResult, Timestamp};
use serde::{Deserialize, Serialize};

/// Per-entry metadata stored in the `meta` partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    /// Creation time of the entry
    pub created_at: Timestamp,
    /// Checksum computed at write time
    pub checksum: Checksum,
    /// Sequence number of the write that stored this version
    pub seq: u64,
}

pub(crate) fn encode_meta(meta: &MetaRecord) -> LedgerResult<Vec<u8>> {
    rmp_serde::to_vec(meta).map_err(|e| LedgerError::storage(format!("encode meta: {e}")))
}

pub(crate) fn decode_meta(bytes: &[u8]) -> LedgerResult<MetaRecord> {
    rmp_serde::from_slice(bytes).map_err(|e| LedgerError::corruption(format!("decode meta: {e}")))
}

pub(crate) fn encode_factors(factors: &FactorVector) -> LedgerResult<Vec<u8>> {
    rmp_serde::to_vec(factors).map_err(|e| LedgerError::storage(format!("encode factors: {e}")))
}

pub(crate) fn decode_factors(bytes: &[u8]) -> LedgerResult<FactorVector> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| LedgerError::corruption(format!("decode factors: {e}")))
}

pub(crate) fn encode_weight(delta: f64) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    BigEndian::write_f64(&mut buf, delta);
    buf
}

pub(crate) fn decode_weight(bytes: &[u8]) -> LedgerResult<f64> {
    if bytes.len() != 8 {
        return Err(LedgerError::corruption(format!(
            "factor posting has {} bytes, expected 8",
            bytes.len()
        )));
    }
    Ok(BigEndian::read_f64(bytes))
}

pub(crate) fn decode_text(bytes: Vec<u8>) -> LedgerResult<String> {
    String::from_utf8(bytes).map_err(|e| LedgerError::invalid_text(format!("stored text is not UTF-8: {e}")))
}
