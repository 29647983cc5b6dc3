//! Token-prime index
//!
//! This module contains:
//! - `tokenizer`: the one tokenization rule used for entries and queries
//! - `primes`: deterministic prime numbering of tokens
//! - `snapshot`: immutable postings produced by a rebuild
//! - `index`: rebuild, persistence and ranked queries

mod index;
pub mod primes;
mod snapshot;
pub mod tokenizer;

pub use index::{IndexState, QueryMode, QueryResult, RebuildSummary, TokenPrimeIndex};
pub use snapshot::{IndexSnapshot, Postings};
pub use tokenizer::{normalize_query, tokenize, tokenize_unique};
