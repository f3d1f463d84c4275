//! Certificate Verification
//!
//! Orchestrates document hashing, leaf commitment and proof replay into
//! per-field and per-document outcomes.
//!
//! Every field is evaluated independently. A field that cannot be evaluated
//! (malformed proof, missing value) is reported as `matched: false` with a
//! diagnostic, which keeps it distinguishable from a field that was evaluated
//! and proven not to match (`matched: false`, no diagnostic).

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::certificate::extract::ExtractedFields;
use crate::certificate::issuer::{IssuerRegistry, IssuerVerdict};
use crate::certificate::metadata::CertificateMetadata;
use crate::config::VerifierConfig;
use crate::core::document::DocumentHasher;
use crate::core::hash::Hash;
use crate::error::{VerifyError, VerifyResult};
use crate::proof::leaf::{commit, commit_bytes, Salt};
use crate::proof::merkle::{MerkleProof, MerkleProofVerifier, RawProofStep};

/// Whole-document verification outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentOutcome {
    /// Document hash equals the anchored hash.
    pub matched: bool,
    /// Hash differs but the embedded identifier equals the anchored one.
    /// Never a cryptographic match.
    pub identity_plausible: bool,
    /// Hash of the submitted bytes.
    pub computed_hash: Hash,
    /// Anchored hash.
    pub expected_hash: Hash,
}

/// Why a field could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FieldDiagnostic {
    /// No value was supplied or extracted for the field.
    MissingValue,
    /// The metadata carries no proof for the field.
    MissingProof,
    /// The proof could not be decoded.
    InvalidProofFormat(String),
    /// Field text was not UTF-8.
    Encoding(String),
    /// Any other evaluation failure.
    Failed(String),
}

impl From<&VerifyError> for FieldDiagnostic {
    fn from(err: &VerifyError) -> Self {
        match err {
            VerifyError::InvalidProofFormat { .. } => Self::InvalidProofFormat(err.to_string()),
            VerifyError::Encoding(_) => Self::Encoding(err.to_string()),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Per-field verification outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldOutcome {
    /// Field value is proven part of the anchored commitment.
    pub matched: bool,
    /// Set when the field could not be evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<FieldDiagnostic>,
}

impl FieldOutcome {
    /// Outcome of a completed evaluation.
    pub fn evaluated(matched: bool) -> Self {
        Self {
            matched,
            diagnostic: None,
        }
    }

    /// Outcome of a field that could not be evaluated.
    pub fn unevaluated(diagnostic: FieldDiagnostic) -> Self {
        Self {
            matched: false,
            diagnostic: Some(diagnostic),
        }
    }

    /// True unless evaluation failed.
    pub fn was_evaluated(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// A field value paired with its proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldEvidence {
    /// Submitted value.
    pub value: String,
    /// Wire proof from the metadata.
    pub proof: Vec<RawProofStep>,
}

impl FieldEvidence {
    /// Pair a value with a proof.
    pub fn new(value: impl Into<String>, proof: Vec<RawProofStep>) -> Self {
        Self {
            value: value.into(),
            proof,
        }
    }
}

/// Values submitted for a certificate: extracted from the PDF, typed in by
/// the holder, or both. Typed values and salts win over extracted ones.
#[derive(Clone, Debug, Default)]
pub struct SubmittedFields {
    values: BTreeMap<String, String>,
    typed: BTreeSet<String>,
    salt: Option<Salt>,
    embedded_id: Option<String>,
}

impl SubmittedFields {
    /// Nothing submitted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from values recovered from the PDF.
    pub fn from_extracted(extracted: &ExtractedFields) -> Self {
        Self {
            values: extracted
                .fields()
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            typed: BTreeSet::new(),
            salt: extracted.salt().cloned(),
            embedded_id: extracted.nft_id().map(str::to_string),
        }
    }

    /// Set or override a field value.
    pub fn with_value(mut self, field_name: impl Into<String>, value: impl Into<String>) -> Self {
        let field_name = field_name.into();
        self.typed.insert(field_name.clone());
        self.values.insert(field_name, value.into());
        self
    }

    /// Override the salt. `None` keeps whatever was extracted.
    pub fn with_salt(mut self, salt: Option<Salt>) -> Self {
        if salt.is_some() {
            self.salt = salt;
        }
        self
    }

    /// Value for a field.
    pub fn value(&self, field_name: &str) -> Option<&str> {
        self.values.get(field_name).map(String::as_str)
    }

    /// Effective salt.
    pub fn salt(&self) -> Option<&Salt> {
        self.salt.as_ref()
    }

    /// Identifier embedded in the submitted document.
    pub fn embedded_id(&self) -> Option<&str> {
        self.embedded_id.as_deref()
    }
}

/// Document section of a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentCheck {
    /// The document was hashed and compared.
    Evaluated(DocumentOutcome),
    /// The document could not be hashed.
    Failed {
        /// Error description.
        reason: String,
    },
}

impl DocumentCheck {
    /// True only for a cryptographic match.
    pub fn matched(&self) -> bool {
        matches!(self, Self::Evaluated(outcome) if outcome.matched)
    }
}

/// Full verification report for one certificate.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationReport {
    /// Certificate identifier from the metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,
    /// Document check, when a document was submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentCheck>,
    /// Outcome per field.
    pub fields: BTreeMap<String, FieldOutcome>,
    /// Issuer trust verdict.
    pub issuer: IssuerVerdict,
}

impl VerificationReport {
    /// Number of fields proven to match.
    pub fn fields_matched(&self) -> usize {
        self.fields.values().filter(|o| o.matched).count()
    }

    /// At least one field and every field matched.
    pub fn all_fields_matched(&self) -> bool {
        !self.fields.is_empty() && self.fields.values().all(|o| o.matched)
    }

    /// With a document: it matched and every proven field matched (a
    /// certificate with no proofs is hash-only). Without one: at least one
    /// field and every field matched.
    pub fn is_verified(&self) -> bool {
        match &self.document {
            Some(check) => check.matched() && self.fields.values().all(|o| o.matched),
            None => self.all_fields_matched(),
        }
    }
}

/// Certificate verification service.
#[derive(Clone, Debug, Default)]
pub struct CertificateVerificationService {
    config: VerifierConfig,
    hasher: DocumentHasher,
    verifier: MerkleProofVerifier,
}

impl CertificateVerificationService {
    /// Create a service from configuration.
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            hasher: config.document_hasher(),
            verifier: MerkleProofVerifier::new(config.pair_ordering),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    // =========================================================================
    // DOCUMENT
    // =========================================================================

    /// Hash the document and compare with the anchored hash.
    pub fn verify_document(&self, bytes: &[u8], expected: &Hash) -> VerifyResult<bool> {
        Ok(self.hasher.hash(bytes)? == *expected)
    }

    /// Document check with the embedded-identifier fallback.
    pub fn check_document(
        &self,
        bytes: &[u8],
        expected: &Hash,
        embedded_id: Option<&str>,
        expected_id: Option<&str>,
    ) -> VerifyResult<DocumentOutcome> {
        let computed = self.hasher.hash(bytes)?;
        Ok(self.document_outcome(computed, *expected, embedded_id, expected_id))
    }

    /// Document check over a blocking reader.
    pub fn check_document_reader<R: Read>(
        &self,
        reader: R,
        expected: &Hash,
        embedded_id: Option<&str>,
        expected_id: Option<&str>,
    ) -> VerifyResult<DocumentOutcome> {
        let computed = self.hasher.hash_reader(reader)?;
        Ok(self.document_outcome(computed, *expected, embedded_id, expected_id))
    }

    /// Document check over an async reader.
    pub async fn check_document_async<R: AsyncRead + Unpin>(
        &self,
        reader: R,
        expected: &Hash,
        embedded_id: Option<&str>,
        expected_id: Option<&str>,
    ) -> VerifyResult<DocumentOutcome> {
        let computed = self.hasher.hash_async_reader(reader).await?;
        Ok(self.document_outcome(computed, *expected, embedded_id, expected_id))
    }

    fn document_outcome(
        &self,
        computed: Hash,
        expected: Hash,
        embedded_id: Option<&str>,
        expected_id: Option<&str>,
    ) -> DocumentOutcome {
        let matched = computed == expected;
        let identity_plausible = !matched
            && self.config.identity_fallback
            && match (embedded_id.map(str::trim), expected_id.map(str::trim)) {
                (Some(a), Some(b)) => !a.is_empty() && a == b,
                _ => false,
            };

        if matched {
            debug!("Document hash verified: {}", computed.short());
        } else {
            warn!(
                "Document hash mismatch: computed {}, expected {} (identity plausible: {})",
                computed.short(),
                expected.short(),
                identity_plausible
            );
        }

        DocumentOutcome {
            matched,
            identity_plausible,
            computed_hash: computed,
            expected_hash: expected,
        }
    }

    // =========================================================================
    // FIELDS
    // =========================================================================

    /// Commit a field value and replay its proof against the root.
    pub fn verify_field(
        &self,
        field_name: &str,
        field_value: &str,
        salt: Option<&Salt>,
        proof: &[RawProofStep],
        expected_root: &Hash,
    ) -> VerifyResult<bool> {
        let proof = MerkleProof::decode(proof)?;
        let leaf = commit(field_name, field_value, salt);
        Ok(self.verifier.verify(&leaf, &proof, expected_root))
    }

    /// [`verify_field`](Self::verify_field) for raw bytes that must be UTF-8.
    pub fn verify_field_bytes(
        &self,
        field_name: &[u8],
        field_value: &[u8],
        salt: Option<&Salt>,
        proof: &[RawProofStep],
        expected_root: &Hash,
    ) -> VerifyResult<bool> {
        let leaf = commit_bytes(field_name, field_value, salt)?;
        let proof = MerkleProof::decode(proof)?;
        Ok(self.verifier.verify(&leaf, &proof, expected_root))
    }

    /// Verify every field independently.
    pub fn verify_all(
        &self,
        fields: &BTreeMap<String, FieldEvidence>,
        salt: Option<&Salt>,
        expected_root: &Hash,
    ) -> BTreeMap<String, FieldOutcome> {
        fields
            .iter()
            .map(|(name, evidence)| {
                let outcome = evaluate_field(&self.verifier, name, evidence, salt, expected_root);
                (name.clone(), outcome)
            })
            .collect()
    }

    /// Verify every field on the blocking pool, one task per field.
    ///
    /// Produces the same mapping as [`verify_all`](Self::verify_all).
    pub async fn verify_all_concurrent(
        &self,
        fields: BTreeMap<String, FieldEvidence>,
        salt: Option<Salt>,
        expected_root: Hash,
    ) -> VerifyResult<BTreeMap<String, FieldOutcome>> {
        let mut tasks = JoinSet::new();

        for (name, evidence) in fields {
            let verifier = self.verifier;
            let salt = salt.clone();
            tasks.spawn_blocking(move || {
                let outcome = evaluate_field(&verifier, &name, &evidence, salt.as_ref(), &expected_root);
                (name, outcome)
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, outcome) = joined.map_err(|e| VerifyError::Task(e.to_string()))?;
            outcomes.insert(name, outcome);
        }

        Ok(outcomes)
    }

    // =========================================================================
    // CERTIFICATE
    // =========================================================================

    /// Verify a certificate: document, every proven field, and the issuer.
    #[instrument(skip_all, fields(nft_id = ?metadata.nft_id))]
    pub fn verify_certificate(
        &self,
        registry: &IssuerRegistry,
        metadata: &CertificateMetadata,
        submitted: &SubmittedFields,
        document: Option<&[u8]>,
        today: NaiveDate,
    ) -> VerificationReport {
        let document = document.map(|bytes| {
            to_document_check(self.check_document(
                bytes,
                &metadata.document_hash,
                submitted.embedded_id(),
                metadata.nft_id.as_deref(),
            ))
        });

        let (evidence, mut fields) = collect_evidence(metadata, submitted);
        fields.extend(self.verify_all(&evidence, submitted.salt(), &metadata.root_hash));

        self.finish_report(registry, metadata, document, fields, today)
    }

    /// [`verify_certificate`](Self::verify_certificate) with a streamed
    /// document and fields verified concurrently.
    #[instrument(skip_all, fields(nft_id = ?metadata.nft_id))]
    pub async fn verify_certificate_concurrent<R: AsyncRead + Unpin>(
        &self,
        registry: &IssuerRegistry,
        metadata: &CertificateMetadata,
        submitted: &SubmittedFields,
        document: Option<R>,
        today: NaiveDate,
    ) -> VerifyResult<VerificationReport> {
        let document = match document {
            Some(reader) => Some(to_document_check(
                self.check_document_async(
                    reader,
                    &metadata.document_hash,
                    submitted.embedded_id(),
                    metadata.nft_id.as_deref(),
                )
                .await,
            )),
            None => None,
        };

        let (evidence, mut fields) = collect_evidence(metadata, submitted);
        fields.extend(
            self.verify_all_concurrent(evidence, submitted.salt().cloned(), metadata.root_hash)
                .await?,
        );

        Ok(self.finish_report(registry, metadata, document, fields, today))
    }

    fn finish_report(
        &self,
        registry: &IssuerRegistry,
        metadata: &CertificateMetadata,
        document: Option<DocumentCheck>,
        fields: BTreeMap<String, FieldOutcome>,
        today: NaiveDate,
    ) -> VerificationReport {
        let issuer = registry.verify_optional(metadata.issuer_address.as_deref(), today);

        let report = VerificationReport {
            nft_id: metadata.nft_id.clone(),
            document,
            fields,
            issuer,
        };

        info!(
            "Certificate {}: {}/{} fields verified, document {}, issuer {:?}",
            report.nft_id.as_deref().unwrap_or("<unknown>"),
            report.fields_matched(),
            report.fields.len(),
            match &report.document {
                Some(check) if check.matched() => "verified",
                Some(_) => "not verified",
                None => "not submitted",
            },
            report.issuer.level,
        );

        report
    }
}

/// Evaluate one field, capturing errors as diagnostics.
fn evaluate_field(
    verifier: &MerkleProofVerifier,
    name: &str,
    evidence: &FieldEvidence,
    salt: Option<&Salt>,
    expected_root: &Hash,
) -> FieldOutcome {
    let outcome = match MerkleProof::decode(&evidence.proof) {
        Ok(proof) => {
            let leaf = commit(name, &evidence.value, salt);
            FieldOutcome::evaluated(verifier.verify(&leaf, &proof, expected_root))
        }
        Err(err) => FieldOutcome::unevaluated(FieldDiagnostic::from(&err)),
    };
    debug!("Field {}: {:?}", name, outcome);
    outcome
}

/// Pair submitted values with metadata proofs.
///
/// Returns the evidence to evaluate plus outcomes for fields that cannot be
/// evaluated: proven fields with no value and typed values with no proof.
fn collect_evidence(
    metadata: &CertificateMetadata,
    submitted: &SubmittedFields,
) -> (BTreeMap<String, FieldEvidence>, BTreeMap<String, FieldOutcome>) {
    let mut evidence = BTreeMap::new();
    let mut unevaluated = BTreeMap::new();

    for name in metadata.field_names() {
        match (submitted.value(name), metadata.proof_for(name)) {
            (Some(value), Some(proof)) if !value.is_empty() => {
                evidence.insert(name.to_string(), FieldEvidence::new(value, proof.to_vec()));
            }
            _ => {
                unevaluated.insert(name.to_string(), FieldOutcome::unevaluated(FieldDiagnostic::MissingValue));
            }
        }
    }

    // Extracted extras are ignored; only typed values demand a proof.
    for name in submitted.typed.iter() {
        if metadata.proof_for(name).is_none() {
            unevaluated.insert(name.clone(), FieldOutcome::unevaluated(FieldDiagnostic::MissingProof));
        }
    }

    (evidence, unevaluated)
}

fn to_document_check(result: VerifyResult<DocumentOutcome>) -> DocumentCheck {
    match result {
        Ok(outcome) => DocumentCheck::Evaluated(outcome),
        Err(err) => DocumentCheck::Failed {
            reason: err.to_string(),
        },
    }
}
