//! Write batches and the journal seam
//!
//! A [`WriteBatch`] is the unit of atomicity: all of its operations become
//! visible together under one sequence number and reach the journal as one
//! [`JournalRecord`].

use serde::{Deserialize, Serialize};

use qpledger_core::{LedgerError, LedgerResult};

use crate::partition::Partition;

/// One operation inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    /// Insert or overwrite
    Put {
        /// Target partition
        partition: Partition,
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Remove a key (no-op when absent)
    Delete {
        /// Target partition
        partition: Partition,
        /// Key bytes
        key: Vec<u8>,
    },
    /// Add `delta` to a counter
    Merge {
        /// Target partition; must be a counter partition
        partition: Partition,
        /// Counter key
        key: Vec<u8>,
        /// Non-negative increment
        delta: u64,
    },
}

impl BatchOp {
    /// Partition this operation touches
    pub fn partition(&self) -> Partition {
        match self {
            BatchOp::Put { partition, .. }
            | BatchOp::Delete { partition, .. }
            | BatchOp::Merge { partition, .. } => *partition,
        }
    }

    /// Key this operation touches
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key, .. } | BatchOp::Merge { key, .. } => {
                key
            }
        }
    }
}

/// Ordered set of operations applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch over already-built operations (journal replay)
    pub fn from_ops(ops: Vec<BatchOp>) -> Self {
        Self { ops }
    }

    /// Queue a put
    pub fn put(&mut self, partition: Partition, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            partition,
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, partition: Partition, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            partition,
            key: key.into(),
        });
        self
    }

    /// Queue a counter merge
    pub fn merge(&mut self, partition: Partition, key: impl Into<Vec<u8>>, delta: u64) -> &mut Self {
        self.ops.push(BatchOp::Merge {
            partition,
            key: key.into(),
            delta,
        });
        self
    }

    /// Queued operations in order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume into operations
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Partitions touched, ascending by lock order, without duplicates
    pub fn partitions(&self) -> Vec<Partition> {
        let mut touched: Vec<Partition> = self.ops.iter().map(BatchOp::partition).collect();
        touched.sort_by_key(|p| p.index());
        touched.dedup();
        touched
    }

    /// Reject batches that can never apply
    pub fn validate(&self) -> LedgerResult<()> {
        if self.ops.is_empty() {
            return Err(LedgerError::invalid_operation("empty write batch"));
        }
        for op in &self.ops {
            if let BatchOp::Merge { partition, .. } = op {
                if !partition.is_counter() {
                    return Err(LedgerError::invalid_operation(format!(
                        "partition {partition} does not accept merge"
                    )));
                }
            }
            if op.key().is_empty() {
                return Err(LedgerError::invalid_operation(format!(
                    "empty key in partition {}",
                    op.partition()
                )));
            }
        }
        Ok(())
    }
}

/// What the journal persists per applied batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Sequence number assigned to the batch
    pub seq: u64,
    /// Operations in application order
    pub ops: Vec<BatchOp>,
}

/// Durable sink for applied batches.
///
/// `append` is called under the store's sequencer, in sequence order, with
/// no partition lock held and before the batch becomes visible. An error
/// aborts the batch, so a failed append must leave nothing behind that a
/// later replay would pick up.
pub trait Journal: Send + Sync {
    /// Persist one record according to the journal's durability policy
    fn append(&self, record: &JournalRecord) -> LedgerResult<()>;

    /// Force everything appended so far to stable storage
    fn sync(&self) -> LedgerResult<()>;
}
