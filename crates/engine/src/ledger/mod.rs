//! Ledger entry lifecycle
//!
//! One entry is spread over three partitions under its encoded composite key:
//! `R` (text), `Qp` (factor vector) and `meta` (creation time, checksum,
//! write sequence). A write stores all three, appends `seq → key` to the
//! `bridge` change feed, refreshes the entry's factor postings in `index`
//! and bumps the `w/<namespace>` counter, all in one batch.
//!
//! # Factor postings
//!
//! For every slot prime an entry carries, `index` holds `f/<prime><key>`
//! with the slot's delta. A write deletes the postings of every slot prime
//! the new vector lacks, so postings always mirror `Qp` without reading the
//! previous version. [`LedgerManager::query_factors`] intersects them.
//!
//! # Growth
//!
//! The change feed keeps one `bridge` row per write and the WAL one frame
//! per batch; neither is compacted. Overwriting a key N times costs N rows
//! and N frames replayed on every open.
//!
//! # Change notification
//!
//! Every write is stamped with the store sequence number of its batch. The
//! index polls [`LedgerManager::latest_seq`] and [`LedgerManager::changes_since`]
//! to tell whether its snapshot is current; the ledger never touches the
//! index itself.
//!
//! # Concurrency
//!
//! Writes to the same key are serialized through the shared
//! [`KeyLockTable`]. Reads take no key lock; they see one batch or the next,
//! never a mix.

pub mod codec;
pub mod keys;

use std::collections::BTreeMap;
use std::sync::Arc;

use qpledger_concurrency::{KeyLockTable, Readback};
use qpledger_core::{
    slot_index, Checksum, CompositeKey, LedgerEntry, LedgerError, LedgerResult, SLOT_PRIMES,
};
use qpledger_storage::{Partition, PartitionedStore, WriteBatch};
use tracing::{debug, warn};

pub use codec::MetaRecord;

use codec::{
    decode_factors, decode_meta, decode_text, decode_weight, encode_factors, encode_meta,
    encode_weight,
};
use keys::{
    bridge_key, factor_posting_key, factor_prime_prefix, parse_bridge_key,
    parse_factor_posting_key, writes_counter,
};

/// Partitions a ledger write touches
const WRITE_PARTITIONS: [Partition; 6] = [
    Partition::Meta,
    Partition::R,
    Partition::Qp,
    Partition::Bridge,
    Partition::Index,
    Partition::Ethics,
];

/// Partitions an entry read consults
const READ_PARTITIONS: [Partition; 3] = [Partition::Meta, Partition::R, Partition::Qp];

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Checksum of the stored entry
    pub checksum: Checksum,
    /// Sequence number stamped on the write
    pub seq: u64,
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    /// Entries in key order
    pub entries: Vec<LedgerEntry>,
    /// Resume after this key; `None` when exhausted
    pub next_cursor: Option<CompositeKey>,
}

/// One hit of [`LedgerManager::query_factors`]
#[derive(Debug, Clone, PartialEq)]
pub struct FactorMatch {
    /// Entry carrying every queried prime
    pub key: CompositeKey,
    /// Smallest delta among the queried primes
    pub weight: f64,
}

/// Owns reads and writes of ledger entries
pub struct LedgerManager {
    store: Arc<PartitionedStore>,
    locks: Arc<KeyLockTable>,
    max_text_bytes: usize,
}

impl LedgerManager {
    /// Manager over `store`, serializing per-key writes through `locks`
    pub fn new(store: Arc<PartitionedStore>, locks: Arc<KeyLockTable>, max_text_bytes: usize) -> Self {
        Self {
            store,
            locks,
            max_text_bytes,
        }
    }

    /// Per-key lock table shared with the rotation engine
    pub fn locks(&self) -> &KeyLockTable {
        &self.locks
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Validate and persist an entry, returning its checksum.
    ///
    /// Replaces any entry under the same key. Fails with `InvalidFactor` or
    /// `InvalidText` before anything is stored.
    pub fn write(&self, entry: &LedgerEntry) -> LedgerResult<Checksum> {
        self.write_with_receipt(entry).map(|r| r.checksum)
    }

    /// [`write`](Self::write), also returning the write sequence number
    pub fn write_with_receipt(&self, entry: &LedgerEntry) -> LedgerResult<WriteReceipt> {
        self.validate(entry)?;
        let encoded = entry.key().encode();
        let _guard = self.locks.lock(&encoded);
        self.write_unlocked(entry)
    }

    /// Persist an entry; the caller must hold the key's lock
    pub(crate) fn write_unlocked(&self, entry: &LedgerEntry) -> LedgerResult<WriteReceipt> {
        self.validate(entry)?;

        let key = entry.key().encode();
        let checksum = entry.recompute_checksum();
        let factors = encode_factors(entry.factors())?;
        let text = entry.text().as_bytes().to_vec();
        let counter = writes_counter(entry.key().namespace());
        let created_at = entry.created_at();
        let postings: Vec<(Vec<u8>, Option<Vec<u8>>)> = SLOT_PRIMES
            .iter()
            .map(|&prime| {
                let delta = entry.factors().get(prime);
                let value = (delta != 0.0).then(|| encode_weight(delta));
                (factor_posting_key(prime, &key), value)
            })
            .collect();

        let outcome = self.store.apply_sequenced(&WRITE_PARTITIONS, |seq| {
            let meta = encode_meta(&MetaRecord {
                created_at,
                checksum,
                seq,
            })?;
            let mut batch = WriteBatch::new();
            batch
                .put(Partition::Meta, key.clone(), meta)
                .put(Partition::R, key.clone(), text)
                .put(Partition::Qp, key.clone(), factors)
                .put(Partition::Bridge, bridge_key(seq), key.clone())
                .merge(Partition::Ethics, counter.clone(), 1);
            for (posting, value) in postings {
                match value {
                    Some(weight) => batch.put(Partition::Index, posting, weight),
                    None => batch.delete(Partition::Index, posting),
                };
            }
            Ok(batch)
        })?;

        for (_, counter, merge) in &outcome.merges {
            if merge.saturated {
                warn!(
                    target: "qpledger::ledger",
                    counter = %String::from_utf8_lossy(counter),
                    value = merge.value,
                    "Write counter saturated"
                );
            }
        }

        debug!(target: "qpledger::ledger", key = %entry.key(), seq = outcome.seq, checksum = %checksum, "Entry written");
        Ok(WriteReceipt {
            checksum,
            seq: outcome.seq,
        })
    }

    fn validate(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        entry.factors().validate()?;
        let len = entry.text().len();
        if len > self.max_text_bytes {
            return Err(LedgerError::invalid_text(format!(
                "text is {len} bytes, limit is {}",
                self.max_text_bytes
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Point read of one entry.
    ///
    /// The stored checksum is verified against the stored content; a
    /// disagreement is `ChecksumMismatch`.
    pub fn read(&self, key: &CompositeKey) -> LedgerResult<LedgerEntry> {
        self.read_with_seq(key).map(|(entry, _)| entry)
    }

    /// Read an entry together with the sequence number of its last write
    pub fn read_with_seq(&self, key: &CompositeKey) -> LedgerResult<(LedgerEntry, u64)> {
        self.try_read(key)?
            .ok_or_else(|| LedgerError::not_found(key))
    }

    /// Sequence number and checksum currently visible for `key`
    pub fn readback(&self, key: &CompositeKey) -> LedgerResult<Option<Readback>> {
        Ok(self.try_read(key)?.map(|(entry, seq)| Readback {
            key: key.to_string(),
            seq,
            checksum: entry.checksum(),
        }))
    }

    fn try_read(&self, key: &CompositeKey) -> LedgerResult<Option<(LedgerEntry, u64)>> {
        let encoded = key.encode();
        let mut parts = self.store.multi_get(&READ_PARTITIONS, &encoded).into_iter();
        let (meta, text, factors) = match (parts.next(), parts.next(), parts.next()) {
            (Some(Some(meta)), Some(Some(text)), Some(Some(factors))) => (meta, text, factors),
            (Some(None), _, _) => return Ok(None),
            _ => {
                return Err(LedgerError::corruption(format!(
                    "entry {key} is missing a partition"
                )))
            }
        };

        let meta = decode_meta(&meta)?;
        let entry = LedgerEntry::from_parts(
            key.clone(),
            decode_text(text)?,
            decode_factors(&factors)?,
            meta.created_at,
            meta.checksum,
        )?;
        Ok(Some((entry, meta.seq)))
    }

    /// Whether an entry exists under `key`
    pub fn exists(&self, key: &CompositeKey) -> bool {
        self.store.get(Partition::Meta, &key.encode()).is_some()
    }

    /// Entries whose encoded key starts with `prefix`, in key order.
    ///
    /// `prefix` is matched against `namespace:identifier` bytes, so `"a:"`
    /// lists namespace `a` and `""` lists everything.
    pub fn list_by_prefix(&self, prefix: &str, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        self.list_page(prefix, limit, None).map(|page| page.entries)
    }

    /// One page of [`list_by_prefix`](Self::list_by_prefix), resuming after `after`
    pub fn list_page(
        &self,
        prefix: &str,
        limit: usize,
        after: Option<&CompositeKey>,
    ) -> LedgerResult<EntryPage> {
        let cursor = after.map(CompositeKey::encode);
        let page = self
            .store
            .scan_prefix(Partition::Meta, prefix.as_bytes(), limit, cursor.as_deref());

        let mut entries = Vec::with_capacity(page.entries.len());
        for (raw, _) in &page.entries {
            let key = CompositeKey::decode(raw)?;
            // Deleted between the scan and the read: skip rather than fail.
            if let Some((entry, _)) = self.try_read(&key)? {
                entries.push(entry);
            }
        }

        let next_cursor = page
            .next_cursor
            .map(|raw| CompositeKey::decode(&raw))
            .transpose()?;
        Ok(EntryPage {
            entries,
            next_cursor,
        })
    }

    /// Entries carrying every prime in `primes`, in key order, at most `limit`.
    ///
    /// Each hit is weighted by its smallest delta among the queried primes.
    /// An empty `primes` matches nothing. Each prime's postings are read
    /// under their own lock, so a write racing the query may be seen for
    /// some primes and not others.
    ///
    /// # Errors
    ///
    /// `InvalidFactor` if a prime is outside the slot alphabet.
    pub fn query_factors(&self, primes: &[u32], limit: usize) -> LedgerResult<Vec<FactorMatch>> {
        for &prime in primes {
            if slot_index(prime).is_none() {
                return Err(LedgerError::invalid_factor(format!(
                    "Prime {prime} is not in the slot alphabet {SLOT_PRIMES:?}"
                )));
            }
        }
        let mut wanted = primes.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let mut hits: Option<BTreeMap<Vec<u8>, f64>> = None;
        for prime in wanted {
            let page = self.store.scan_prefix(
                Partition::Index,
                &factor_prime_prefix(prime),
                usize::MAX,
                None,
            );
            let mut postings = BTreeMap::new();
            for (raw, value) in page.entries {
                let key = parse_factor_posting_key(prime, &raw)?.to_vec();
                postings.insert(key, decode_weight(&value)?);
            }
            hits = Some(match hits {
                None => postings,
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(key, w)| postings.get(&key).map(|&d| (key, w.min(d))))
                    .collect(),
            });
        }

        let matches = hits
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|(raw, weight)| {
                Ok(FactorMatch {
                    key: CompositeKey::decode(&raw)?,
                    weight,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        debug!(target: "qpledger::ledger", ?primes, hits = matches.len(), "Factor query");
        Ok(matches)
    }

    // ========================================================================
    // Change feed
    // ========================================================================

    /// Sequence number of the newest ledger write (0 before any write)
    pub fn latest_seq(&self) -> LedgerResult<u64> {
        match self.store.last(Partition::Bridge) {
            Some((key, _)) => parse_bridge_key(&key),
            None => Ok(0),
        }
    }

    /// Writes stamped after `seq`, oldest first, at most `limit`
    pub fn changes_since(&self, seq: u64, limit: usize) -> LedgerResult<Vec<(u64, CompositeKey)>> {
        let after = bridge_key(seq);
        let page = self
            .store
            .scan_prefix(Partition::Bridge, b"", limit, Some(&after));
        page.entries
            .iter()
            .map(|(k, v)| Ok((parse_bridge_key(k)?, CompositeKey::decode(v)?)))
            .collect()
    }
}

impl std::fmt::Debug for LedgerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerManager")
            .field("entries", &self.store.partition_len(Partition::Meta))
            .field("max_text_bytes", &self.max_text_bytes)
            .finish()
    }
}
