//! Logical partitions sharing one physical store

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of partitions
pub const PARTITION_COUNT: usize = 6;

/// Independently keyed namespaces within the store.
///
/// Partitions share one journal and one sequence counter but never share
/// keys. A composite key is the only join key across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Partition {
    /// Entry metadata: creation time, checksum, write sequence
    Meta,
    /// Raw entry text
    R,
    /// Encoded factor vectors
    Qp,
    /// Change feed: write sequence -> composite key
    Bridge,
    /// Persisted token postings of the last completed index build
    Index,
    /// Merge-only counters
    Ethics,
}

impl Partition {
    /// All partitions in lock order
    pub const ALL: [Partition; PARTITION_COUNT] = [
        Partition::Meta,
        Partition::R,
        Partition::Qp,
        Partition::Bridge,
        Partition::Index,
        Partition::Ethics,
    ];

    /// Slot of this partition; also the lock acquisition order
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Partition::Meta => 0,
            Partition::R => 1,
            Partition::Qp => 2,
            Partition::Bridge => 3,
            Partition::Index => 4,
            Partition::Ethics => 5,
        }
    }

    /// Stable on-disk name
    pub const fn name(self) -> &'static str {
        match self {
            Partition::Meta => "meta",
            Partition::R => "R",
            Partition::Qp => "Qp",
            Partition::Bridge => "bridge",
            Partition::Index => "index",
            Partition::Ethics => "ethics",
        }
    }

    /// Look up a partition by its on-disk name
    pub fn from_name(name: &str) -> Option<Self> {
        Partition::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Whether `merge` is allowed on this partition
    pub const fn is_counter(self) -> bool {
        matches!(self, Partition::Ethics)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
