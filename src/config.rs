//! Verifier Configuration
//!
//! Settings that change how evidence is evaluated. Loaded from environment
//! variables, then optionally overridden by CLI flags.

use thiserror::Error;

use crate::core::document::{DocumentHasher, EmptyDocumentPolicy, DEFAULT_READ_BUFFER};
use crate::proof::merkle::PairOrdering;

/// Environment variable selecting the pair combination rule.
pub const ENV_PAIR_ORDERING: &str = "CERT_PROOF_PAIR_ORDERING";
/// Environment variable selecting the empty document policy.
pub const ENV_EMPTY_DOCUMENT: &str = "CERT_PROOF_EMPTY_DOCUMENT";
/// Environment variable toggling the embedded-identifier fallback.
pub const ENV_IDENTITY_FALLBACK: &str = "CERT_PROOF_IDENTITY_FALLBACK";
/// Environment variable setting the streaming read buffer in bytes.
pub const ENV_READ_BUFFER: &str = "CERT_PROOF_READ_BUFFER";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A setting had a value outside its accepted set.
    #[error("invalid {setting}: {value:?}")]
    InvalidValue {
        /// Which setting.
        setting: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl ConfigError {
    /// Build an `InvalidValue` error.
    pub fn invalid(setting: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            setting,
            value: value.into(),
        }
    }
}

/// Verification engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierConfig {
    /// How sibling pairs are ordered before hashing.
    pub pair_ordering: PairOrdering,
    /// Behavior for zero-length documents.
    pub empty_document: EmptyDocumentPolicy,
    /// Report an embedded identifier match when the document hash differs.
    pub identity_fallback: bool,
    /// Streaming read buffer in bytes.
    pub read_buffer_size: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            pair_ordering: PairOrdering::default(),
            empty_document: EmptyDocumentPolicy::default(),
            identity_fallback: true,
            read_buffer_size: DEFAULT_READ_BUFFER,
        }
    }
}

impl VerifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_PAIR_ORDERING) {
            config.pair_ordering = value.parse()?;
        }
        if let Some(value) = lookup(ENV_EMPTY_DOCUMENT) {
            config.empty_document = value.parse()?;
        }
        if let Some(value) = lookup(ENV_IDENTITY_FALLBACK) {
            config.identity_fallback = parse_flag(ENV_IDENTITY_FALLBACK, &value)?;
        }
        if let Some(value) = lookup(ENV_READ_BUFFER) {
            config.read_buffer_size = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::invalid(ENV_READ_BUFFER, value.clone()))?;
        }

        Ok(config)
    }

    /// Document hasher built from these settings.
    pub fn document_hasher(&self) -> DocumentHasher {
        DocumentHasher::new(self.read_buffer_size, self.empty_document)
    }
}

fn parse_flag(setting: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(setting, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = VerifierConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, VerifierConfig::default());
        assert_eq!(config.pair_ordering, PairOrdering::Sorted);
        assert!(config.identity_fallback);
    }

    #[test]
    fn test_all_settings_parsed() {
        let config = VerifierConfig::from_lookup(lookup_from(&[
            (ENV_PAIR_ORDERING, "positional"),
            (ENV_EMPTY_DOCUMENT, "reject"),
            (ENV_IDENTITY_FALLBACK, "false"),
            (ENV_READ_BUFFER, "4096"),
        ]))
        .unwrap();

        assert_eq!(config.pair_ordering, PairOrdering::Positional);
        assert_eq!(config.empty_document, EmptyDocumentPolicy::Reject);
        assert!(!config.identity_fallback);
        assert_eq!(config.read_buffer_size, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(VerifierConfig::from_lookup(lookup_from(&[(ENV_PAIR_ORDERING, "random")])).is_err());
        assert!(VerifierConfig::from_lookup(lookup_from(&[(ENV_IDENTITY_FALLBACK, "perhaps")])).is_err());
        assert!(VerifierConfig::from_lookup(lookup_from(&[(ENV_READ_BUFFER, "0")])).is_err());
        assert!(VerifierConfig::from_lookup(lookup_from(&[(ENV_READ_BUFFER, "lots")])).is_err());
    }
}
