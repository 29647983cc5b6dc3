//! Database: one partitioned store plus the components built on it
//!
//! # Layout on disk
//!
//! ```text
//! <dir>/
//!   qpledger.toml      optional configuration
//!   wal/ledger.wal     write-ahead log (absent in cache mode)
//! ```
//!
//! # Recovery
//!
//! `open` replays every valid WAL record into an empty store through the same
//! merge accumulator that produced it, truncating a torn tail first, then
//! loads the persisted index snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use qpledger_concurrency::KeyLockTable;
use qpledger_core::{CancelToken, Checksum, CompositeKey, LedgerEntry, LedgerResult};
use qpledger_durability::wal::WAL_FILE_NAME;
use qpledger_durability::WAL;
use qpledger_storage::{MergeAccumulator, PartitionedStore};
use tracing::info;

use crate::config::LedgerConfig;
use crate::ethics::EthicsLedger;
use crate::ledger::{FactorMatch, LedgerManager};
use crate::search::{QueryMode, QueryResult, RebuildSummary, TokenPrimeIndex};
use crate::transform::{FactorTransform, RotateResult};

/// Directory under the database root holding the WAL
pub const WAL_DIR: &str = "wal";

/// Embedded ledger database
pub struct Database {
    path: Option<PathBuf>,
    config: LedgerConfig,
    store: Arc<PartitionedStore>,
    wal: Option<Arc<WAL>>,
    ledger: Arc<LedgerManager>,
    transform: FactorTransform,
    index: TokenPrimeIndex,
    ethics: EthicsLedger,
}

impl Database {
    /// Open (or create) a database in `dir`, reading `dir/qpledger.toml` if present
    pub fn open(dir: impl AsRef<Path>) -> LedgerResult<Self> {
        let dir = dir.as_ref();
        let config = LedgerConfig::load_from_dir(dir)?;
        Self::open_with_config(dir, config)
    }

    /// Open (or create) a database in `dir` with an explicit configuration
    pub fn open_with_config(dir: impl AsRef<Path>, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let started = Instant::now();
        let accumulator = MergeAccumulator::new(config.counter_ceiling);

        let (store, wal) = if config.durability.requires_wal() {
            let wal_path = dir.join(WAL_DIR).join(WAL_FILE_NAME);
            let (wal, scan) = WAL::open_and_read(&wal_path, config.durability)?;
            let wal = Arc::new(wal);
            let store = PartitionedStore::with_journal(accumulator, wal.clone());
            let replayed = scan.records.len();
            for record in scan.records {
                store.replay(record)?;
            }
            info!(
                target: "qpledger::storage",
                path = %dir.display(),
                replayed,
                version = store.version(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Database recovered"
            );
            (Arc::new(store), Some(wal))
        } else {
            info!(target: "qpledger::storage", path = %dir.display(), "Database opened without WAL");
            (Arc::new(PartitionedStore::new(accumulator)), None)
        };

        Ok(Self::assemble(Some(dir), config, store, wal))
    }

    /// Ephemeral in-memory database with default settings and no directory
    pub fn cache() -> Self {
        Self::cache_with_config(LedgerConfig::cache())
    }

    /// Ephemeral in-memory database; `config.durability` is ignored
    pub fn cache_with_config(config: LedgerConfig) -> Self {
        let store = Arc::new(PartitionedStore::new(MergeAccumulator::new(
            config.counter_ceiling,
        )));
        Self::assemble(None, config, store, None)
    }

    fn assemble(
        path: Option<PathBuf>,
        config: LedgerConfig,
        store: Arc<PartitionedStore>,
        wal: Option<Arc<WAL>>,
    ) -> Self {
        let locks = Arc::new(KeyLockTable::new());
        let ledger = Arc::new(LedgerManager::new(
            Arc::clone(&store),
            locks,
            config.max_text_bytes,
        ));
        let transform = FactorTransform::new(Arc::clone(&ledger));
        let index = TokenPrimeIndex::open(Arc::clone(&store), Arc::clone(&ledger), config.scan_page_size);
        let ethics = EthicsLedger::new(Arc::clone(&store));
        Self {
            path,
            config,
            store,
            wal,
            ledger,
            transform,
            index,
            ethics,
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Database directory; `None` for cache databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Active configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<PartitionedStore> {
        &self.store
    }

    /// Ledger entry manager
    pub fn ledger(&self) -> &LedgerManager {
        &self.ledger
    }

    /// Token-prime index
    pub fn index(&self) -> &TokenPrimeIndex {
        &self.index
    }

    /// Counter ledger
    pub fn ethics(&self) -> &EthicsLedger {
        &self.ethics
    }

    /// Whether writes are journaled
    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    // ========================================================================
    // Core calls
    // ========================================================================

    /// Persist an entry; see [`LedgerManager::write`]
    pub fn write(&self, entry: &LedgerEntry) -> LedgerResult<Checksum> {
        self.ledger.write(entry)
    }

    /// Read an entry; see [`LedgerManager::read`]
    pub fn read(&self, key: &CompositeKey) -> LedgerResult<LedgerEntry> {
        self.ledger.read(key)
    }

    /// List entries by key prefix; see [`LedgerManager::list_by_prefix`]
    pub fn list_by_prefix(&self, prefix: &str, limit: usize) -> LedgerResult<Vec<LedgerEntry>> {
        self.ledger.list_by_prefix(prefix, limit)
    }

    /// Entries carrying every prime; see [`LedgerManager::query_factors`]
    pub fn query_factors(&self, primes: &[u32], limit: usize) -> LedgerResult<Vec<FactorMatch>> {
        self.ledger.query_factors(primes, limit)
    }

    /// Rotate an entry's factors; see [`FactorTransform::rotate`]
    pub fn rotate(&self, key: &CompositeKey, axis: [f64; 3], angle: f64) -> LedgerResult<RotateResult> {
        self.transform.rotate(key, axis, angle)
    }

    /// Rebuild the index; see [`TokenPrimeIndex::rebuild`]
    pub fn rebuild(&self, cancel: &CancelToken) -> LedgerResult<RebuildSummary> {
        self.index.rebuild(cancel)
    }

    /// Query the index; see [`TokenPrimeIndex::query`]
    pub fn query<I, S>(&self, tokens: I, mode: QueryMode, limit: usize) -> LedgerResult<QueryResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.index.query(tokens, mode, limit)
    }

    /// Raw counter merge; see [`EthicsLedger::merge_counter`]
    pub fn merge(&self, counter: &str, delta: u64) -> LedgerResult<u64> {
        self.ethics.merge_counter(counter, delta)
    }

    /// Force everything written so far to stable storage
    pub fn flush(&self) -> LedgerResult<()> {
        self.store.sync()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("durability", &self.config.durability)
            .field("store", &self.store)
            .finish()
    }
}
