//! Hash Primitives
//!
//! Fixed-length SHA-256 digests and their canonical hex encoding.
//!
//! Every hash that crosses the engine boundary is a 32-byte digest written as
//! 64 lowercase hex characters with no `0x` prefix. Input is accepted in any
//! case (and with an optional `0x`), output is always canonical.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::HashError;

/// Length of a SHA-256 digest in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a canonical hex-encoded digest.
pub const HASH_HEX_LEN: usize = HASH_LEN * 2;

/// A 32-byte SHA-256 digest.
///
/// Equality is byte equality, which is the same as comparing canonical
/// lowercase hex. Ordering is also byte ordering; lowercase hex sorts
/// identically, so `a < b` holds iff `a.to_hex() < b.to_hex()`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Parse a hex digest, case-insensitively, with an optional `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, HashError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != HASH_HEX_LEN {
            return Err(HashError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| HashError::InvalidHex(digits.to_string()))?;
        Ok(Self(bytes))
    }

    /// Canonical lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Canonical hex encoding written into a fixed buffer (no allocation).
    pub fn hex_bytes(&self) -> [u8; HASH_HEX_LEN] {
        let mut out = [0u8; HASH_HEX_LEN];
        // Buffer length is exactly twice the input, so this cannot fail.
        let _ = hex::encode_to_slice(self.0, &mut out);
        out
    }

    /// Abbreviated hex for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compare two hex digests after normalization.
///
/// Malformed input on either side never compares equal.
pub fn hex_eq(a: &str, b: &str) -> bool {
    match (Hash::from_hex(a), Hash::from_hex(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Single SHA-256 of arbitrary data.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// SHA-256 applied twice: the second pass runs over the raw 32 digest bytes
/// of the first, not over its hex text.
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = sha256(data);
    sha256(first.as_bytes())
}
