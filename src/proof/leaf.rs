//! Field Leaf Commitments
//!
//! Each certificate field is committed as a salted, double-hashed leaf:
//!
//! ```text
//! message = "{salt}:{name}:{value}"   (or "{name}:{value}" without a salt)
//! leaf    = SHA256( SHA256(message) )  (second pass over the raw digest bytes)
//! ```
//!
//! The salt is the per-certificate security code. A leaf computed with the
//! wrong salt, or without one when the issuer used one, simply fails to match.

use std::fmt;

use crate::core::hash::{double_sha256, Hash};
use crate::error::VerifyResult;

/// Per-certificate salt in canonical (de-dashed) form.
///
/// Display layers group the code as `abcd-1234-...`; the engine always
/// consumes the bare string. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(String);

impl Salt {
    /// Canonicalize a user- or document-supplied salt.
    ///
    /// Strips dashes and surrounding whitespace. Returns `None` when nothing
    /// is left, since an empty salt commits the same as no salt.
    pub fn parse(raw: &str) -> Option<Self> {
        let canonical: String = raw.trim().chars().filter(|c| *c != '-').collect();
        if canonical.is_empty() {
            None
        } else {
            Some(Self(canonical))
        }
    }

    /// Canonical salt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form: 4-character chunks joined by dashes.
    pub fn display_grouped(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        chars
            .chunks(4)
            .map(|chunk| chunk.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt(<{} chars>)", self.0.chars().count())
    }
}

/// Plaintext leaf message for a field.
pub fn leaf_message(field_name: &str, field_value: &str, salt: Option<&Salt>) -> String {
    match salt {
        Some(salt) => format!("{}:{}:{}", salt.as_str(), field_name, field_value),
        None => format!("{}:{}", field_name, field_value),
    }
}

/// Leaf commitment for a field.
pub fn commit(field_name: &str, field_value: &str, salt: Option<&Salt>) -> Hash {
    double_sha256(leaf_message(field_name, field_value, salt).as_bytes())
}

/// Leaf commitment from raw bytes, rejecting text that is not UTF-8.
pub fn commit_bytes(field_name: &[u8], field_value: &[u8], salt: Option<&Salt>) -> VerifyResult<Hash> {
    let name = std::str::from_utf8(field_name)?;
    let value = std::str::from_utf8(field_value)?;
    Ok(commit(name, value, salt))
}

/// A named field value awaiting commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldCommitmentInput {
    /// Field name, e.g. `name` or `course`.
    pub field_name: String,
    /// Field value exactly as committed by the issuer.
    pub field_value: String,
    /// Certificate salt, if the issuer used one.
    pub salt: Option<Salt>,
}

impl FieldCommitmentInput {
    /// Create an unsalted input.
    pub fn new(field_name: impl Into<String>, field_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: field_value.into(),
            salt: None,
        }
    }

    /// Attach a salt.
    pub fn with_salt(mut self, salt: Option<Salt>) -> Self {
        self.salt = salt;
        self
    }

    /// Plaintext leaf message.
    pub fn message(&self) -> String {
        leaf_message(&self.field_name, &self.field_value, self.salt.as_ref())
    }

    /// Leaf commitment hash.
    pub fn commitment(&self) -> Hash {
        commit(&self.field_name, &self.field_value, self.salt.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::sha256;
    use crate::error::VerifyError;

    // Pinned against an independent SHA-256 implementation.
    const NAME_ALICE_SALTED: &str = "05919e84f2b60b5e94eb9669268a3211df626a8f02ca2361de45764efa8227e1";
    const NAME_ALICE_UNSALTED: &str = "d96eaa5bf4cc5dd217b5ea852c218929e46bff2592fbbf14511be8281dc67bb7";
    const NAME_ALICE_FIRST_PASS: &str = "98349de555af8be7834cf10a76bf3d8f27ec69e57cace213c99ffb537846f602";

    fn salt() -> Salt {
        Salt::parse("abcd1234").unwrap()
    }

    #[test]
    fn test_leaf_message_format() {
        assert_eq!(leaf_message("name", "Alice", None), "name:Alice");
        assert_eq!(leaf_message("name", "Alice", Some(&salt())), "abcd1234:name:Alice");
    }

    #[test]
    fn test_salted_commitment_vector() {
        assert_eq!(
            sha256(b"abcd1234:name:Alice").to_hex(),
            NAME_ALICE_FIRST_PASS
        );
        assert_eq!(commit("name", "Alice", Some(&salt())).to_hex(), NAME_ALICE_SALTED);
    }

    #[test]
    fn test_unsalted_commitment_vector() {
        assert_eq!(commit("name", "Alice", None).to_hex(), NAME_ALICE_UNSALTED);
    }

    #[test]
    fn test_empty_value_is_legal() {
        let a = commit("name", "", None);
        let b = commit("name", "", None);
        assert_eq!(a, b);
        assert_ne!(a, commit("name", "Alice", None));
    }

    #[test]
    fn test_salt_canonicalization() {
        assert_eq!(Salt::parse(" abcd-1234-ef ").unwrap().as_str(), "abcd1234ef");
        assert!(Salt::parse("").is_none());
        assert!(Salt::parse("---").is_none());
    }

    #[test]
    fn test_dashed_salt_commits_like_bare_salt() {
        let dashed = Salt::parse("abcd-1234").unwrap();
        assert_eq!(
            commit("name", "Alice", Some(&dashed)),
            commit("name", "Alice", Some(&salt()))
        );
    }

    #[test]
    fn test_display_grouping() {
        assert_eq!(Salt::parse("abcd1234ef").unwrap().display_grouped(), "abcd-1234-ef");
        assert_eq!(Salt::parse("abcd").unwrap().display_grouped(), "abcd");
    }

    #[test]
    fn test_debug_hides_salt() {
        let printed = format!("{:?}", salt());
        assert!(!printed.contains("abcd1234"));
    }

    #[test]
    fn test_commit_bytes_rejects_invalid_utf8() {
        let result = commit_bytes(b"name", &[0xff, 0xfe], None);
        assert!(matches!(result, Err(VerifyError::Encoding(_))));
        assert_eq!(
            commit_bytes(b"name", b"Alice", None).unwrap(),
            commit("name", "Alice", None)
        );
    }

    #[test]
    fn test_field_input_matches_free_function() {
        let input = FieldCommitmentInput::new("name", "Alice").with_salt(Some(salt()));
        assert_eq!(input.message(), "abcd1234:name:Alice");
        assert_eq!(input.commitment().to_hex(), NAME_ALICE_SALTED);
    }
}
