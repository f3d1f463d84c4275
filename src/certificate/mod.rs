//! Certificate Collaborators
//!
//! Everything around the verification engine that knows what a certificate
//! looks like: the anchored NFT metadata, values recovered from the PDF, and
//! the issuer trust registry. None of it performs I/O.

pub mod extract;
pub mod issuer;
pub mod metadata;

pub use extract::{extract_fields, ExtractedFields, PdfInfo};
pub use issuer::{IssuerInfo, IssuerKind, IssuerRegistry, IssuerVerdict, VerificationLevel};
pub use metadata::{CertificateMetadata, LedgerAssetResponse};
