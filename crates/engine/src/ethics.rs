//! Ethics ledger: merge-only counters
//!
//! Every counter lives in the `ethics` partition and changes only through the
//! store's merge path. Nothing here reads a counter to write it back, so
//! concurrent credits never lose updates.
//!
//! Raw counters, entity tallies and the ledger's write counts live under
//! separate key roots (see [`crate::ledger::keys`]). A raw counter called
//! `e/bob/credits` or a namespace called `credits` never touches a tally.
//!
//! Counters saturate at the configured ceiling. The saturated value is
//! stored, and the call that hit the ceiling fails with `CounterOverflow`.

use std::sync::Arc;

use qpledger_core::{LedgerError, LedgerResult};
use qpledger_storage::{decode_counter, Partition, PartitionedStore};
use tracing::{debug, warn};

use crate::ledger::keys::{
    credits_counter, debits_counter, raw_counter, validate_counter, validate_entity,
    writes_counter, RAW_ROOT,
};

/// Credit/debit totals of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Sum of credits
    pub credits: u64,
    /// Sum of debits
    pub debits: u64,
    /// `credits − debits`
    pub balance: i128,
}

/// Merge-only counters in the `ethics` partition
pub struct EthicsLedger {
    store: Arc<PartitionedStore>,
}

impl EthicsLedger {
    /// Ledger over `store`
    pub fn new(store: Arc<PartitionedStore>) -> Self {
        Self { store }
    }

    /// Add `delta` to the counter `name`, returning the new value.
    ///
    /// # Errors
    ///
    /// `CounterOverflow` when the merge reached the ceiling; the counter
    /// holds the ceiling afterwards.
    pub fn merge_counter(&self, name: &str, delta: u64) -> LedgerResult<u64> {
        validate_counter(name)?;
        self.merge_key(&raw_counter(name), name, delta)
    }

    fn merge_key(&self, key: &str, name: &str, delta: u64) -> LedgerResult<u64> {
        let outcome = self.store.merge(Partition::Ethics, key.as_bytes(), delta)?;
        if outcome.saturated {
            let ceiling = self.store.accumulator().ceiling();
            warn!(target: "qpledger::ethics", counter = name, ceiling, "Counter saturated");
            return Err(LedgerError::CounterOverflow {
                counter: name.to_string(),
                ceiling,
            });
        }
        debug!(target: "qpledger::ethics", counter = name, delta, value = outcome.value, "Counter merged");
        Ok(outcome.value)
    }

    fn read_key(&self, key: &str) -> LedgerResult<u64> {
        match self.store.get(Partition::Ethics, key.as_bytes()) {
            Some(raw) => decode_counter(&raw),
            None => Ok(0),
        }
    }

    /// Current value of `name` (0 when never merged)
    pub fn counter(&self, name: &str) -> LedgerResult<u64> {
        validate_counter(name)?;
        self.read_key(&raw_counter(name))
    }

    /// Number of ledger writes into `namespace`
    pub fn writes(&self, namespace: &str) -> LedgerResult<u64> {
        self.read_key(&writes_counter(namespace))
    }

    /// Raw counters whose name starts with `prefix`, in name order
    pub fn counters(&self, prefix: &str, limit: usize) -> LedgerResult<Vec<(String, u64)>> {
        self.store
            .scan_prefix(Partition::Ethics, raw_counter(prefix).as_bytes(), limit, None)
            .entries
            .into_iter()
            .map(|(k, v)| {
                let name = k
                    .strip_prefix(RAW_ROOT.as_bytes())
                    .ok_or_else(|| LedgerError::corruption("raw counter outside its root"))?;
                let name = String::from_utf8(name.to_vec())
                    .map_err(|e| LedgerError::corruption(format!("counter name is not UTF-8: {e}")))?;
                Ok((name, decode_counter(&v)?))
            })
            .collect()
    }

    /// Credit `amount` to `entity`
    pub fn credit(&self, entity: &str, amount: u64) -> LedgerResult<u64> {
        validate_entity(entity)?;
        self.merge_key(&credits_counter(entity), &format!("{entity}/credits"), amount)
    }

    /// Debit `amount` from `entity`
    pub fn debit(&self, entity: &str, amount: u64) -> LedgerResult<u64> {
        validate_entity(entity)?;
        self.merge_key(&debits_counter(entity), &format!("{entity}/debits"), amount)
    }

    /// Credits, debits and balance of `entity`, read under one lock
    pub fn tally(&self, entity: &str) -> LedgerResult<Tally> {
        validate_entity(entity)?;
        let credits_key = credits_counter(entity);
        let debits_key = debits_counter(entity);
        let values = self
            .store
            .get_many(Partition::Ethics, &[credits_key.as_bytes(), debits_key.as_bytes()]);

        let read = |v: &Option<Vec<u8>>| match v {
            Some(raw) => decode_counter(raw),
            None => Ok(0),
        };
        let credits = read(&values[0])?;
        let debits = read(&values[1])?;
        Ok(Tally {
            credits,
            debits,
            balance: i128::from(credits) - i128::from(debits),
        })
    }
}

impl std::fmt::Debug for EthicsLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthicsLedger")
            .field("counters", &self.store.partition_len(Partition::Ethics))
            .finish()
    }
}
