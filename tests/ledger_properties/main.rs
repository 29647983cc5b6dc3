//! Ledger property suite
//!
//! Cross-crate properties checked through the public `qpledger` API:
//!
//! - **entries**: write/read round-trip and checksum integrity
//! - **merge**: counter merges are order- and grouping-independent, and
//!   saturate instead of wrapping
//! - **rotation**: zero-angle identity and forward/backward round-trip
//! - **index**: rebuild idempotence and ranked query semantics
//! - **scan**: byte-order prefix scans and restartable cursors
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test ledger_properties
//! ```

mod test_utils;

mod entry_properties;
mod index_properties;
mod merge_properties;
mod rotation_properties;
mod scan_properties;
