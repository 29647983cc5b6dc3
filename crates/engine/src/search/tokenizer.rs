//! Text tokenizer for the token-prime index
//!
//! Pipeline: lowercase → split on non-alphanumeric → drop empty fragments
//!
//! No stemming and no stopwords. The same rule is applied to entry text at
//! build time and to query tokens at query time.

use std::collections::BTreeSet;

/// Tokenize text into index terms, in order of appearance.
///
/// # Example
///
/// ```
/// use qpledger_engine::search::tokenizer::tokenize;
///
/// let tokens = tokenize("Met Priya, NYC!");
/// assert_eq!(tokens, vec!["met", "priya", "nyc"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct tokens of `text` in sorted order
pub fn tokenize_unique(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Normalize caller-supplied query tokens with the same rule.
///
/// A query token such as `"New-York"` contributes both `new` and `york`.
pub fn normalize_query<I, S>(tokens: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .flat_map(|t| tokenize(t.as_ref()))
        .collect()
}
