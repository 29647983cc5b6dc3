//! Durability modes

use serde::{Deserialize, Serialize};

/// When appended records reach stable storage.
///
/// In TOML:
///
/// ```toml
/// durability = "strict"
/// # or
/// durability = { batched = { max_pending = 64 } }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurabilityMode {
    /// No log at all; state lives only in memory
    Cache,
    /// fsync after every record
    #[default]
    Strict,
    /// fsync once `max_pending` records are buffered, and on flush/drop
    Batched {
        /// Records allowed between fsyncs
        max_pending: usize,
    },
}

impl DurabilityMode {
    /// Whether this mode keeps a log file
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::Cache)
    }

    /// Whether `pending` unsynced records call for an fsync now
    pub(crate) fn should_sync(&self, pending: usize) -> bool {
        match self {
            DurabilityMode::Cache => false,
            DurabilityMode::Strict => pending > 0,
            DurabilityMode::Batched { max_pending } => pending >= (*max_pending).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_syncs_every_record() {
        assert!(DurabilityMode::Strict.should_sync(1));
        assert!(!DurabilityMode::Strict.should_sync(0));
    }

    #[test]
    fn test_batched_threshold() {
        let mode = DurabilityMode::Batched { max_pending: 3 };
        assert!(!mode.should_sync(2));
        assert!(mode.should_sync(3));
    }

    #[test]
    fn test_batched_zero_behaves_like_strict() {
        let mode = DurabilityMode::Batched { max_pending: 0 };
        assert!(mode.should_sync(1));
    }

    #[test]
    fn test_cache_never_syncs() {
        assert!(!DurabilityMode::Cache.requires_wal());
        assert!(!DurabilityMode::Cache.should_sync(1_000));
    }
}
