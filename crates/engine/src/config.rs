//! Database configuration
//!
//! Loaded from `<db>/qpledger.toml` when present. Every field has a default,
//! so an empty file (or no file) yields [`LedgerConfig::default`].
//!
//! ```toml
//! durability = { batched = { max_pending = 64 } }
//! counter_ceiling = 1000000
//! max_text_bytes = 65536
//! scan_page_size = 256
//! ```

use std::path::Path;

use qpledger_core::{LedgerError, LedgerResult};
use qpledger_durability::DurabilityMode;
use serde::{Deserialize, Serialize};

/// Name of the config file inside a database directory
pub const CONFIG_FILE_NAME: &str = "qpledger.toml";

/// Tunables for one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// WAL fsync policy
    #[serde(default)]
    pub durability: DurabilityMode,

    /// Saturation ceiling for merge counters
    #[serde(default = "default_counter_ceiling")]
    pub counter_ceiling: u64,

    /// Largest accepted entry text, in bytes
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,

    /// Entries fetched per page while rebuilding the index
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,
}

const fn default_counter_ceiling() -> u64 {
    u64::MAX
}

const fn default_max_text_bytes() -> usize {
    64 * 1024
}

const fn default_scan_page_size() -> usize {
    256
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            durability: DurabilityMode::default(),
            counter_ceiling: default_counter_ceiling(),
            max_text_bytes: default_max_text_bytes(),
            scan_page_size: default_scan_page_size(),
        }
    }
}

impl LedgerConfig {
    /// In-memory configuration with no WAL
    pub fn cache() -> Self {
        Self {
            durability: DurabilityMode::Cache,
            ..Self::default()
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the TOML is invalid or a value is out of range.
    pub fn from_toml(content: &str) -> LedgerResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LedgerError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Load `<dir>/qpledger.toml`, or defaults when the file does not exist
    pub fn load_from_dir(dir: &Path) -> LedgerResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> LedgerResult<String> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::config(e.to_string()))
    }

    /// Reject values no database can run with
    pub fn validate(&self) -> LedgerResult<()> {
        if self.scan_page_size == 0 {
            return Err(LedgerError::config("scan_page_size must be at least 1"));
        }
        if self.max_text_bytes == 0 {
            return Err(LedgerError::config("max_text_bytes must be at least 1"));
        }
        Ok(())
    }
}
