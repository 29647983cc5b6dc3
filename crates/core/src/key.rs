//! Composite key construction and parsing.
//!
//! A ledger entry is addressed by `(namespace, identifier)`. The encoded form
//! is `{namespace}:{identifier}` as UTF-8 bytes. Neither part may contain the
//! separator, so every encoded key parses back to exactly one pair. Keys that
//! would need escaping are rejected at the boundary instead of being
//! truncated or rewritten.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Separator between namespace and identifier in encoded keys.
pub const SEP: char = ':';

/// Upper bound on the encoded key length in bytes.
pub const MAX_KEY_BYTES: usize = 1024;

// =============================================================================
// Validation
// =============================================================================

/// Validate a namespace.
pub fn validate_namespace(namespace: &str) -> LedgerResult<()> {
    if namespace.is_empty() {
        return Err(LedgerError::invalid_key("Namespace must not be empty"));
    }
    if namespace.contains(SEP) {
        return Err(LedgerError::invalid_key(format!(
            "Namespace must not contain '{SEP}'"
        )));
    }
    if namespace.contains('\0') {
        return Err(LedgerError::invalid_key("Namespace must not contain NUL"));
    }
    Ok(())
}

/// Validate an identifier.
pub fn validate_identifier(identifier: &str) -> LedgerResult<()> {
    if identifier.is_empty() {
        return Err(LedgerError::invalid_key("Identifier must not be empty"));
    }
    if identifier.contains(SEP) {
        return Err(LedgerError::invalid_key(format!(
            "Identifier must not contain '{SEP}'"
        )));
    }
    if identifier.contains('\0') {
        return Err(LedgerError::invalid_key("Identifier must not contain NUL"));
    }
    Ok(())
}

// =============================================================================
// CompositeKey
// =============================================================================

/// `(namespace, identifier)` pair addressing one ledger entry.
///
/// Ordering is the byte order of the encoded form, which is also the order
/// partitions iterate in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompositeKey {
    namespace: String,
    identifier: String,
}

impl CompositeKey {
    /// Build a key, validating both parts.
    pub fn new(namespace: impl Into<String>, identifier: impl Into<String>) -> LedgerResult<Self> {
        let namespace = namespace.into();
        let identifier = identifier.into();
        validate_namespace(&namespace)?;
        validate_identifier(&identifier)?;
        if namespace.len() + identifier.len() + SEP.len_utf8() > MAX_KEY_BYTES {
            return Err(LedgerError::invalid_key(format!(
                "Encoded key exceeds {MAX_KEY_BYTES} bytes"
            )));
        }
        Ok(Self {
            namespace,
            identifier,
        })
    }

    /// Namespace part
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Identifier part
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Encoded byte form: `{namespace}:{identifier}`
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse an encoded key.
    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| LedgerError::invalid_key("Encoded key is not valid UTF-8"))?;
        text.parse()
    }

    /// Byte prefix matching every key in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> LedgerResult<Vec<u8>> {
        validate_namespace(namespace)?;
        Ok(format!("{namespace}{SEP}").into_bytes())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEP}{}", self.namespace, self.identifier)
    }
}

impl FromStr for CompositeKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, identifier) = s
            .split_once(SEP)
            .ok_or_else(|| LedgerError::invalid_key(format!("Missing '{SEP}' in key {s:?}")))?;
        CompositeKey::new(namespace, identifier)
    }
}

impl TryFrom<String> for CompositeKey {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompositeKey> for String {
    fn from(key: CompositeKey) -> Self {
        key.to_string()
    }
}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Namespaces never contain ':', so comparing the parts with the
        // separator in between matches comparing the encoded bytes.
        let a = self.namespace.bytes().chain(std::iter::once(b':')).chain(self.identifier.bytes());
        let b = other.namespace.bytes().chain(std::iter::once(b':')).chain(other.identifier.bytes());
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_decode() {
        let key = CompositeKey::new("people", "priya").unwrap();
        assert_eq!(key.encode(), b"people:priya".to_vec());
        assert_eq!(CompositeKey::decode(b"people:priya").unwrap(), key);
    }

    #[test]
    fn test_rejects_empty_namespace() {
        let err = CompositeKey::new("", "x").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKey { .. }));
    }

    #[test]
    fn test_rejects_separator_in_identifier() {
        let err = CompositeKey::new("a", "b:c").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKey { .. }));
    }

    #[test]
    fn test_rejects_separator_in_namespace() {
        assert!(CompositeKey::new("a:b", "c").is_err());
    }

    #[test]
    fn test_rejects_oversized_key() {
        let long = "x".repeat(MAX_KEY_BYTES);
        assert!(CompositeKey::new("ns", long).is_err());
    }

    #[test]
    fn test_decode_without_separator_fails() {
        assert!(CompositeKey::decode(b"noseparator").is_err());
    }

    #[test]
    fn test_ordering_matches_encoded_bytes() {
        let mut keys = vec![
            CompositeKey::new("a", "2").unwrap(),
            CompositeKey::new("a", "10").unwrap(),
            CompositeKey::new("a", "1").unwrap(),
            CompositeKey::new("ab", "0").unwrap(),
        ];
        keys.sort();
        let encoded: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(encoded, vec!["a:1", "a:10", "a:2", "ab:0"]);
    }

    #[test]
    fn test_serde_uses_encoded_form() {
        let key = CompositeKey::new("n", "i").unwrap();
        let s: String = key.clone().into();
        assert_eq!(s, "n:i");
        assert_eq!(CompositeKey::try_from(s).unwrap(), key);
    }

    proptest! {
        #[test]
        fn prop_key_codec_round_trips(ns in "[a-z0-9_./-]{1,16}", id in "[A-Za-z0-9 _./-]{1,32}") {
            let key = CompositeKey::new(ns.clone(), id.clone()).unwrap();
            let decoded = CompositeKey::decode(&key.encode()).unwrap();
            prop_assert_eq!(decoded.namespace(), ns.as_str());
            prop_assert_eq!(decoded.identifier(), id.as_str());
        }

        #[test]
        fn prop_ord_agrees_with_bytes(a in "[a-c]{1,3}", b in "[a-c0-9]{1,3}", c in "[a-c]{1,3}", d in "[a-c0-9]{1,3}") {
            let k1 = CompositeKey::new(a, b).unwrap();
            let k2 = CompositeKey::new(c, d).unwrap();
            prop_assert_eq!(k1.cmp(&k2), k1.encode().cmp(&k2.encode()));
        }
    }
}
