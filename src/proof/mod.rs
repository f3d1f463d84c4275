//! Certificate Proof System
//!
//! Proves individual certificate fields against an anchored Merkle root
//! without revealing the other fields:
//! - Salted double-SHA-256 leaf commitments
//! - Proof replay under a configurable pair-ordering rule
//! - Per-field and whole-document verification
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  leaf.rs         - Field commitments ("salt:name:value")    │
//! │  merkle.rs       - Proof replay and commitment tree         │
//! │  verify.rs       - Certificate verification service        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod leaf;
pub mod merkle;
pub mod verify;

// Re-export key types
pub use leaf::{commit, commit_bytes, leaf_message, FieldCommitmentInput, Salt};
pub use merkle::{
    combine, hash_pair, CommitmentTree, MerkleProof, MerkleProofVerifier, PairOrdering, Position,
    ProofStep, RawProofStep,
};
pub use verify::{
    CertificateVerificationService, DocumentCheck, DocumentOutcome, FieldDiagnostic, FieldEvidence,
    FieldOutcome, SubmittedFields, VerificationReport,
};
