//! Entry checksums
//!
//! A checksum is a SHA-256 Merkle root over the canonical encoding of an
//! entry's factor vector and text:
//!
//! - one leaf per non-zero factor, ascending by prime:
//!   `sha256("f" || prime as u32 BE || delta bits as u64 BE)`
//! - one final leaf for the text: `sha256("t" || utf8 bytes)`
//! - parents are `sha256(left || right)`; an odd node is paired with itself
//!
//! `-0.0` is folded into `0.0` before hashing so numerically equal vectors
//! always hash the same.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, LedgerResult};
use crate::factor::FactorVector;

/// 32-byte entry checksum, rendered as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Checksum(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = LedgerError;

    fn from_str(s: &str) -> LedgerResult<Self> {
        if s.len() != 64 || !s.is_ascii() {
            return Err(LedgerError::corruption(format!("bad checksum hex {s:?}")));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| LedgerError::corruption("bad checksum hex"))?;
            out[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| LedgerError::corruption(format!("bad checksum hex {s:?}")))?;
        }
        Ok(Checksum(out))
    }
}

#[inline]
fn canonical_bits(delta: f64) -> u64 {
    // -0.0 + 0.0 == +0.0
    (delta + 0.0).to_bits()
}

fn factor_leaf(prime: u32, delta: f64) -> [u8; 32] {
    let mut buf = Vec::with_capacity(13);
    buf.push(b'f');
    // Writes into a Vec cannot fail.
    let _ = buf.write_u32::<BigEndian>(prime);
    let _ = buf.write_u64::<BigEndian>(canonical_bits(delta));
    Sha256::digest(&buf).into()
}

fn text_leaf(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"t");
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn merkle_root(mut layer: Vec<[u8; 32]>) -> [u8; 32] {
    if layer.is_empty() {
        return Sha256::digest(b"").into();
    }
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }
    layer[0]
}

/// Checksum over a factor vector and its text
pub fn compute_checksum(factors: &FactorVector, text: &str) -> Checksum {
    let mut leaves: Vec<[u8; 32]> = factors.iter().map(|(p, d)| factor_leaf(p, d)).collect();
    leaves.push(text_leaf(text));
    Checksum(merkle_root(leaves))
}
