//! Error Types
//!
//! A verification can end in three ways: it proves a match, it proves a
//! mismatch (`Ok(false)`), or it cannot be evaluated at all. Only the last
//! case is an error.

use thiserror::Error;

use crate::config::ConfigError;

/// Failure to parse a hex-encoded 32-byte hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Input did not decode to exactly 64 hex characters.
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// Input contained a non-hex character.
    #[error("invalid hex digit in {0:?}")]
    InvalidHex(String),
}

/// Errors that prevent a verification from being evaluated.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The document source could not be fully read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The document was empty and the configured policy rejects empty input.
    #[error("document is empty")]
    EmptyInput,

    /// A proof step carried a malformed sibling hash or position.
    #[error("invalid proof format at step {step}: {reason}")]
    InvalidProofFormat {
        /// Index of the offending step (leaf-to-root order).
        step: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// An expected hash supplied by the caller was malformed.
    #[error("invalid hash: {0}")]
    InvalidHash(#[from] HashError),

    /// Field text was not valid UTF-8.
    #[error("field text is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Certificate metadata failed to decode.
    #[error("metadata decode error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Engine configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The ledger response was well-formed but reported a failure.
    #[error("ledger response rejected: {0}")]
    LedgerRejected(String),

    /// A blocking verification task was cancelled or panicked.
    #[error("verification task failed: {0}")]
    Task(String),
}

impl VerifyError {
    /// Build an `InvalidProofFormat` error for a step.
    pub fn invalid_step(step: usize, reason: impl Into<String>) -> Self {
        Self::InvalidProofFormat {
            step,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the engine.
pub type VerifyResult<T> = Result<T, VerifyError>;
