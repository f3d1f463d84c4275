//! # Cert Proof
//!
//! Verification engine for PDF certificates anchored to an NFT.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CERT PROOF                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Hashing primitives                        │
//! │  ├── hash.rs     - 32-byte hash, hex codec, SHA-256          │
//! │  └── document.rs - Whole-document hashing (bytes/streams)    │
//! │                                                              │
//! │  proof/          - Field proofs                              │
//! │  ├── leaf.rs     - Salted leaf commitments                   │
//! │  ├── merkle.rs   - Proof replay and commitment tree          │
//! │  └── verify.rs   - Certificate verification service          │
//! │                                                              │
//! │  certificate/    - Certificate collaborators                 │
//! │  ├── metadata.rs - Anchored NFT metadata                     │
//! │  ├── extract.rs  - Field recovery from PDF metadata          │
//! │  └── issuer.rs   - Issuer trust registry                     │
//! │                                                              │
//! │  config.rs       - Environment configuration                 │
//! │  error.rs        - Error types                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! The hashing and proof modules are **pure**:
//! - No network access, no shared mutable state
//! - Identical inputs produce identical outcomes on every platform
//! - A malformed proof is an error for its own field only
//!
//! Field values recovered from a PDF are never trusted; they go through
//! the same commitment and proof replay as values typed by the holder.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod config;
pub mod core;
pub mod error;
pub mod proof;

// Re-export commonly used types
pub use certificate::{
    extract_fields, CertificateMetadata, ExtractedFields, IssuerRegistry, IssuerVerdict, PdfInfo,
};
pub use config::{ConfigError, VerifierConfig};
pub use core::{sha256, DocumentHasher, EmptyDocumentPolicy, Hash};
pub use error::{HashError, VerifyError, VerifyResult};
pub use proof::{
    commit, CertificateVerificationService, CommitmentTree, FieldEvidence, FieldOutcome,
    MerkleProof, MerkleProofVerifier, PairOrdering, Position, RawProofStep, Salt, SubmittedFields,
    VerificationReport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
