//! Immutable index snapshots
//!
//! A snapshot is the complete output of one rebuild. It is never patched;
//! the next rebuild produces a new one and swaps it in whole.

use std::collections::{BTreeMap, BTreeSet};

use qpledger_core::{CompositeKey, LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use super::primes::PrimeSequence;
use super::tokenizer::normalize_query;

/// Token → set of entry keys
pub type Postings = BTreeMap<String, BTreeSet<CompositeKey>>;

/// Postings of one completed build, plus derived token primes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    postings: Postings,
    primes: BTreeMap<String, u64>,
    seq: u64,
    entries_indexed: usize,
}

/// Build metadata persisted next to the postings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IndexManifest {
    pub seq: u64,
    pub entries_indexed: usize,
}

impl IndexSnapshot {
    /// Snapshot of a build that saw every ledger write up to `seq`
    pub fn new(postings: Postings, seq: u64, entries_indexed: usize) -> Self {
        let primes = postings
            .keys()
            .cloned()
            .zip(PrimeSequence::new())
            .collect();
        Self {
            postings,
            primes,
            seq,
            entries_indexed,
        }
    }

    /// All postings
    pub fn postings(&self) -> &Postings {
        &self.postings
    }

    /// Keys containing `token` (already normalized)
    pub fn keys_for(&self, token: &str) -> Option<&BTreeSet<CompositeKey>> {
        self.postings.get(token)
    }

    /// Prime assigned to `token` in this snapshot
    pub fn prime_for(&self, token: &str) -> Option<u64> {
        self.primes.get(token).copied()
    }

    /// Primes of the known tokens among `tokens`, after normalization
    pub fn primes_for<I, S>(&self, tokens: I) -> Vec<(String, u64)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        normalize_query(tokens)
            .into_iter()
            .filter_map(|t| self.prime_for(&t).map(|p| (t, p)))
            .collect()
    }

    /// Ledger sequence number the build started from
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Entries the build read
    pub fn entries_indexed(&self) -> usize {
        self.entries_indexed
    }

    /// Distinct tokens
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    /// Total (token, key) pairs
    pub fn posting_count(&self) -> usize {
        self.postings.values().map(BTreeSet::len).sum()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// xxh3-64 over the canonical postings encoding.
    ///
    /// Covers tokens and keys only, so two builds over the same entries
    /// digest equal.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (token, keys) in &self.postings {
            hasher.update(&(token.len() as u32).to_be_bytes());
            hasher.update(token.as_bytes());
            hasher.update(&(keys.len() as u32).to_be_bytes());
            for key in keys {
                let encoded = key.encode();
                hasher.update(&(encoded.len() as u32).to_be_bytes());
                hasher.update(&encoded);
            }
        }
        hasher.digest()
    }

    pub(crate) fn manifest(&self) -> IndexManifest {
        IndexManifest {
            seq: self.seq,
            entries_indexed: self.entries_indexed,
        }
    }
}

pub(crate) fn encode_posting(keys: &BTreeSet<CompositeKey>) -> LedgerResult<Vec<u8>> {
    let keys: Vec<&CompositeKey> = keys.iter().collect();
    rmp_serde::to_vec(&keys).map_err(|e| LedgerError::storage(format!("encode posting: {e}")))
}

pub(crate) fn decode_posting(bytes: &[u8]) -> LedgerResult<BTreeSet<CompositeKey>> {
    let keys: Vec<CompositeKey> = rmp_serde::from_slice(bytes)
        .map_err(|e| LedgerError::corruption(format!("decode posting: {e}")))?;
    Ok(keys.into_iter().collect())
}

pub(crate) fn encode_manifest(manifest: &IndexManifest) -> LedgerResult<Vec<u8>> {
    rmp_serde::to_vec(manifest).map_err(|e| LedgerError::storage(format!("encode manifest: {e}")))
}

pub(crate) fn decode_manifest(bytes: &[u8]) -> LedgerResult<IndexManifest> {
    rmp_serde::from_slice(bytes).map_err(|e| LedgerError::corruption(format!("decode manifest: {e}")))
}
