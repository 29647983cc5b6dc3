//! Key construction and parsing for the auxiliary partitions.
//!
//! Entries live in `meta`, `R` and `Qp` under their encoded composite key.
//! Everything else is keyed here:
//!
//! - `bridge`: big-endian write sequence number → composite key
//! - `ethics`: counter paths, one reserved root per owner so no two owners
//!   can ever name the same counter: `w/<ns>` (ledger write counts),
//!   `e/<entity>/credits|debits` (entity tallies), `c/<name>` (raw counters)
//! - `index`: `t/<token>` postings, `f/<prime><key>` factor postings plus one
//!   manifest record

use byteorder::{BigEndian, ByteOrder};
use qpledger_core::{LedgerError, LedgerResult};

/// Separator used between path segments in counter keys.
const SEP: char = '/';

/// Root of per-namespace write counters
pub const WRITES_ROOT: &str = "w/";

/// Root of entity credit/debit counters
pub const ENTITY_ROOT: &str = "e/";

/// Root of raw counters merged by name
pub const RAW_ROOT: &str = "c/";

// =============================================================================
// Bridge (change feed)
// =============================================================================

/// Bridge key for a write sequence number; byte order equals numeric order
pub fn bridge_key(seq: u64) -> Vec<u8> {
    seq.to_be_bytes().to_vec()
}

/// Parse a bridge key back to its sequence number
pub fn parse_bridge_key(bytes: &[u8]) -> LedgerResult<u64> {
    if bytes.len() != 8 {
        return Err(LedgerError::corruption(format!(
            "bridge key has {} bytes, expected 8",
            bytes.len()
        )));
    }
    Ok(BigEndian::read_u64(bytes))
}

// =============================================================================
// Ethics counters
// =============================================================================

/// Validate an entity or counter path segment.
pub fn validate_entity(entity: &str) -> LedgerResult<()> {
    if entity.is_empty() {
        return Err(LedgerError::invalid_key("entity must not be empty"));
    }
    if entity.contains(SEP) {
        return Err(LedgerError::invalid_key("entity must not contain '/'"));
    }
    Ok(())
}

/// Validate a raw counter name.
pub fn validate_counter(name: &str) -> LedgerResult<()> {
    if name.is_empty() {
        return Err(LedgerError::invalid_key("counter name must not be empty"));
    }
    if name.contains('\0') {
        return Err(LedgerError::invalid_key("counter name must not contain NUL"));
    }
    Ok(())
}

/// Per-namespace write counter bumped by every ledger write
pub fn writes_counter(namespace: &str) -> String {
    format!("{WRITES_ROOT}{namespace}")
}

/// Credit counter of an entity
pub fn credits_counter(entity: &str) -> String {
    format!("{ENTITY_ROOT}{entity}{SEP}credits")
}

/// Debit counter of an entity
pub fn debits_counter(entity: &str) -> String {
    format!("{ENTITY_ROOT}{entity}{SEP}debits")
}

/// Storage key of a raw counter
pub fn raw_counter(name: &str) -> String {
    format!("{RAW_ROOT}{name}")
}

// =============================================================================
// Persisted index
// =============================================================================

/// Prefix of every posting key in the `index` partition
pub const INDEX_TOKEN_PREFIX: &[u8] = b"t/";

/// Key of the record describing the persisted build
pub const INDEX_MANIFEST_KEY: &[u8] = b"m/manifest";

/// Prefix of every factor posting key in the `index` partition
pub const FACTOR_POSTING_PREFIX: &[u8] = b"f/";

/// Prefix of the factor postings of one slot prime
pub fn factor_prime_prefix(prime: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(FACTOR_POSTING_PREFIX.len() + 4);
    key.extend_from_slice(FACTOR_POSTING_PREFIX);
    key.extend_from_slice(&prime.to_be_bytes());
    key
}

/// Factor posting key: `f/` ‖ prime (BE u32) ‖ encoded composite key
pub fn factor_posting_key(prime: u32, encoded_key: &[u8]) -> Vec<u8> {
    let mut key = factor_prime_prefix(prime);
    key.extend_from_slice(encoded_key);
    key
}

/// Encoded composite key of a factor posting under `prime`
pub fn parse_factor_posting_key(prime: u32, key: &[u8]) -> LedgerResult<&[u8]> {
    let prefix = factor_prime_prefix(prime);
    key.strip_prefix(prefix.as_slice())
        .ok_or_else(|| LedgerError::corruption("factor posting key has the wrong prefix"))
}

/// Posting key for a token
pub fn index_token_key(token: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(INDEX_TOKEN_PREFIX.len() + token.len());
    key.extend_from_slice(INDEX_TOKEN_PREFIX);
    key.extend_from_slice(token.as_bytes());
    key
}

/// Token of a posting key, or `None` for any other key
pub fn parse_index_token_key(key: &[u8]) -> Option<LedgerResult<String>> {
    let rest = key.strip_prefix(INDEX_TOKEN_PREFIX)?;
    Some(
        String::from_utf8(rest.to_vec())
            .map_err(|e| LedgerError::corruption(format!("index token is not UTF-8: {e}"))),
    )
}
