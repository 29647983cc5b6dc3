//! Token-prime index
//!
//! An inverted index from normalized tokens to ledger keys, derived entirely
//! from entry text.
//!
//! # States
//!
//! - `Ready`: no rebuild running
//! - `Building`: a rebuild is scanning the ledger
//!
//! Queries are served from the last completed snapshot in both states; the
//! result says whether a build was running and whether ledger writes have
//! happened since the snapshot (`building` / `stale`). Readers never block.
//!
//! # Rebuild
//!
//! A rebuild pages through the whole ledger, builds fresh postings, persists
//! them to the `index` partition in one batch and swaps the new snapshot in
//! through an `ArcSwap`. A cancelled or failed rebuild discards its partial
//! postings; the previous snapshot stays in place. Only one rebuild runs at
//! a time.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use qpledger_core::{CancelToken, CompositeKey, LedgerError, LedgerResult};
use qpledger_storage::{Partition, PartitionedStore, WriteBatch};
use tracing::{debug, info, warn};

use super::snapshot::{
    decode_manifest, decode_posting, encode_manifest, encode_posting, IndexSnapshot, Postings,
};
use super::tokenizer::{normalize_query, tokenize_unique};
use crate::ledger::keys::{
    index_token_key, parse_index_token_key, INDEX_MANIFEST_KEY, INDEX_TOKEN_PREFIX,
};
use crate::ledger::LedgerManager;

// ============================================================================
// Public types
// ============================================================================

/// Whether a rebuild is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// A rebuild is scanning the ledger
    Building,
    /// No rebuild running
    Ready,
}

/// How query tokens combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Keys matching at least one token
    Any,
    /// Keys matching every token
    All,
}

impl FromStr for QueryMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> LedgerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(QueryMode::Any),
            "all" => Ok(QueryMode::All),
            other => Err(LedgerError::invalid_operation(format!(
                "unknown query mode '{other}', expected any or all"
            ))),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryMode::Any => "any",
            QueryMode::All => "all",
        })
    }
}

/// Ranked query answer plus freshness advisories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Matching keys, most matched tokens first, then key order
    pub keys: Vec<CompositeKey>,
    /// A rebuild was running; the previous snapshot answered
    pub building: bool,
    /// Ledger writes happened after the snapshot was taken
    pub stale: bool,
    /// Ledger sequence number the answering snapshot reflects
    pub snapshot_seq: u64,
}

/// What a completed rebuild produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Entries read from the ledger
    pub entries_indexed: usize,
    /// Distinct tokens
    pub tokens_indexed: usize,
    /// Total (token, key) pairs
    pub postings_written: usize,
    /// Ledger sequence number at build start
    pub snapshot_seq: u64,
}

// ============================================================================
// TokenPrimeIndex
// ============================================================================

/// Rebuildable inverted index over the ledger
pub struct TokenPrimeIndex {
    store: Arc<PartitionedStore>,
    ledger: Arc<LedgerManager>,
    snap: ArcSwap<IndexSnapshot>,
    building: AtomicBool,
    page_size: usize,
}

/// Clears the building flag on every exit path
struct BuildingFlag<'a>(&'a AtomicBool);

impl Drop for BuildingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TokenPrimeIndex {
    /// Index starting from an empty `Ready` snapshot
    pub fn new(store: Arc<PartitionedStore>, ledger: Arc<LedgerManager>, page_size: usize) -> Self {
        Self {
            store,
            ledger,
            snap: ArcSwap::from_pointee(IndexSnapshot::default()),
            building: AtomicBool::new(false),
            page_size: page_size.max(1),
        }
    }

    /// Index starting from the snapshot persisted in the `index` partition.
    ///
    /// An unreadable persisted index is logged and replaced by an empty
    /// snapshot; the next rebuild restores it.
    pub fn open(store: Arc<PartitionedStore>, ledger: Arc<LedgerManager>, page_size: usize) -> Self {
        let index = Self::new(store, ledger, page_size);
        match index.load_persisted() {
            Ok(Some(snapshot)) => {
                info!(
                    target: "qpledger::index",
                    tokens = snapshot.token_count(),
                    seq = snapshot.seq(),
                    "Loaded persisted index"
                );
                index.snap.store(Arc::new(snapshot));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "qpledger::index", error = %e, "Persisted index unreadable, starting empty");
            }
        }
        index
    }

    /// Current state
    pub fn state(&self) -> IndexState {
        if self.building.load(Ordering::Acquire) {
            IndexState::Building
        } else {
            IndexState::Ready
        }
    }

    /// Snapshot queries are currently served from
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snap.load_full()
    }

    /// Whether ledger writes happened after the current snapshot
    pub fn is_stale(&self) -> LedgerResult<bool> {
        Ok(self.ledger.latest_seq()? > self.snap.load().seq())
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Rebuild the index from the full ledger.
    ///
    /// # Errors
    ///
    /// - `IndexBuilding` if another rebuild is running
    /// - `Cancelled` if `cancel` fired; nothing is swapped in
    /// - any ledger read or storage error; nothing is swapped in
    pub fn rebuild(&self, cancel: &CancelToken) -> LedgerResult<RebuildSummary> {
        if self
            .building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LedgerError::IndexBuilding);
        }
        let _flag = BuildingFlag(&self.building);
        let started = Instant::now();

        let result = self.build(cancel).and_then(|snapshot| {
            cancel.check()?;
            let summary = RebuildSummary {
                entries_indexed: snapshot.entries_indexed(),
                tokens_indexed: snapshot.token_count(),
                postings_written: snapshot.posting_count(),
                snapshot_seq: snapshot.seq(),
            };
            self.persist(&snapshot)?;
            self.snap.store(Arc::new(snapshot));
            Ok(summary)
        });

        match &result {
            Ok(summary) => info!(
                target: "qpledger::index",
                entries = summary.entries_indexed,
                tokens = summary.tokens_indexed,
                postings = summary.postings_written,
                seq = summary.snapshot_seq,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Index rebuilt"
            ),
            Err(e) => warn!(target: "qpledger::index", error = %e, "Index rebuild aborted, previous snapshot kept"),
        }
        result
    }

    fn build(&self, cancel: &CancelToken) -> LedgerResult<IndexSnapshot> {
        let start_seq = self.ledger.latest_seq()?;
        let mut postings = Postings::new();
        let mut entries = 0usize;
        let mut cursor: Option<CompositeKey> = None;

        loop {
            cancel.check()?;
            let page = self.ledger.list_page("", self.page_size, cursor.as_ref())?;
            for entry in &page.entries {
                cancel.check()?;
                for token in tokenize_unique(entry.text()) {
                    postings.entry(token).or_default().insert(entry.key().clone());
                }
                entries += 1;
            }
            debug!(target: "qpledger::index", scanned = entries, "Rebuild page done");
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(IndexSnapshot::new(postings, start_seq, entries))
    }

    /// Replace the persisted token postings with `snapshot` in one batch.
    ///
    /// Factor postings share the partition and are left alone.
    fn persist(&self, snapshot: &IndexSnapshot) -> LedgerResult<()> {
        let mut batch = WriteBatch::new();

        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let page = self.store.scan_prefix(
                Partition::Index,
                INDEX_TOKEN_PREFIX,
                self.page_size,
                cursor.as_deref(),
            );
            for (key, _) in &page.entries {
                let keep = match parse_index_token_key(key) {
                    Some(Ok(token)) => snapshot.keys_for(&token).is_some(),
                    _ => false,
                };
                if !keep {
                    batch.delete(Partition::Index, key.clone());
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        for (token, keys) in snapshot.postings() {
            batch.put(Partition::Index, index_token_key(token), encode_posting(keys)?);
        }
        batch.put(
            Partition::Index,
            INDEX_MANIFEST_KEY,
            encode_manifest(&snapshot.manifest())?,
        );

        self.store.apply(batch)?;
        Ok(())
    }

    fn load_persisted(&self) -> LedgerResult<Option<IndexSnapshot>> {
        let Some(raw) = self.store.get(Partition::Index, INDEX_MANIFEST_KEY) else {
            return Ok(None);
        };
        let manifest = decode_manifest(&raw)?;

        let mut postings = Postings::new();
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let page = self.store.scan_prefix(
                Partition::Index,
                INDEX_TOKEN_PREFIX,
                self.page_size,
                cursor.as_deref(),
            );
            for (key, value) in &page.entries {
                if let Some(token) = parse_index_token_key(key) {
                    postings.insert(token?, decode_posting(value)?);
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(Some(IndexSnapshot::new(
            postings,
            manifest.seq,
            manifest.entries_indexed,
        )))
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Keys matching `tokens` under `mode`, best first, at most `limit`.
    ///
    /// Tokens go through the index tokenizer first, so `"NYC"` matches
    /// `nyc`. No matches (or no usable tokens) is an empty result, not an
    /// error.
    pub fn query<I, S>(&self, tokens: I, mode: QueryMode, limit: usize) -> LedgerResult<QueryResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: BTreeSet<String> = normalize_query(tokens);
        let building = self.building.load(Ordering::Acquire);
        let snap = self.snap.load_full();
        let stale = self.ledger.latest_seq()? > snap.seq();

        let keys = if tokens.is_empty() || limit == 0 {
            Vec::new()
        } else {
            rank(&snap, &tokens, mode, limit)
        };

        debug!(
            target: "qpledger::index",
            tokens = tokens.len(),
            %mode,
            hits = keys.len(),
            building,
            stale,
            "Query served"
        );
        Ok(QueryResult {
            keys,
            building,
            stale,
            snapshot_seq: snap.seq(),
        })
    }
}

fn rank(
    snap: &IndexSnapshot,
    tokens: &BTreeSet<String>,
    mode: QueryMode,
    limit: usize,
) -> Vec<CompositeKey> {
    let mut matched: BTreeMap<&CompositeKey, usize> = BTreeMap::new();
    for token in tokens {
        if let Some(keys) = snap.keys_for(token) {
            for key in keys {
                *matched.entry(key).or_default() += 1;
            }
        }
    }

    let required = match mode {
        QueryMode::Any => 1,
        QueryMode::All => tokens.len(),
    };
    let mut ranked: Vec<(&CompositeKey, usize)> =
        matched.into_iter().filter(|(_, n)| *n >= required).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(k, _)| k.clone())
        .collect()
}

impl fmt::Debug for TokenPrimeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.snap.load();
        f.debug_struct("TokenPrimeIndex")
            .field("state", &self.state())
            .field("tokens", &snap.token_count())
            .field("seq", &snap.seq())
            .finish()
    }
}
