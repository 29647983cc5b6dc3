//! Partitioned storage layer
//!
//! Provides:
//! - [`Partition`]: the six logical keyspaces
//! - [`PartitionedStore`]: ordered per-partition maps with atomic batches
//! - [`MergeAccumulator`]: saturating counter merge for the `ethics` partition
//! - [`Journal`]: the seam a write-ahead log plugs into

#![warn(missing_docs)]

pub mod batch;
pub mod merge;
pub mod partition;
pub mod store;

pub use batch::{BatchOp, Journal, JournalRecord, WriteBatch};
pub use merge::{decode_counter, encode_counter, MergeAccumulator, MergeOutcome, COUNTER_WIDTH};
pub use partition::{Partition, PARTITION_COUNT};
pub use store::{BatchOutcome, PartitionedStore, ScanPage};
