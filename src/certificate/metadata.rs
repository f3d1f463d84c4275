//! Anchored Certificate Metadata
//!
//! Typed model of the metadata stored with a certificate NFT. These are the
//! reference values evidence is checked against: the document hash, the
//! Merkle root, and one proof per committed field (keyed `"<field>Proof"`).
//!
//! Known keys map to typed fields. Any other string-valued key is kept in
//! [`CertificateMetadata::extensions`]; non-string extras are dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::hash::Hash;
use crate::error::{VerifyError, VerifyResult};
use crate::proof::merkle::RawProofStep;

/// Suffix on proof keys in the `proofs` map.
pub const PROOF_KEY_SUFFIX: &str = "Proof";

/// Status code the ledger uses for a successful lookup.
const LEDGER_SUCCESS: &str = "successful";

/// Metadata anchored with a certificate NFT.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMetadata")]
pub struct CertificateMetadata {
    /// SHA-256 of the issued PDF.
    #[serde(rename = "hash")]
    pub document_hash: Hash,

    /// Merkle root over the field commitments.
    #[serde(rename = "rootHash")]
    pub root_hash: Hash,

    /// Token identifier, e.g. `KCERT-TEST/1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,

    /// Public verification link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,

    /// Proof per field, keyed `"<field>Proof"`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub proofs: BTreeMap<String, Vec<RawProofStep>>,

    /// Address that minted the certificate.
    #[serde(rename = "issuerAddress", skip_serializing_if = "Option::is_none")]
    pub issuer_address: Option<String>,

    /// Current holder address.
    #[serde(rename = "holderAddress", skip_serializing_if = "Option::is_none")]
    pub holder_address: Option<String>,

    /// Unrecognized string-valued keys.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct WireMetadata {
    #[serde(rename = "hash")]
    document_hash: Hash,
    #[serde(rename = "rootHash")]
    root_hash: Hash,
    #[serde(default)]
    nft_id: Option<String>,
    #[serde(default)]
    verify_url: Option<String>,
    #[serde(default)]
    proofs: BTreeMap<String, Value>,
    #[serde(rename = "issuerAddress", default)]
    issuer_address: Option<String>,
    #[serde(rename = "holderAddress", default)]
    holder_address: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl From<WireMetadata> for CertificateMetadata {
    fn from(wire: WireMetadata) -> Self {
        let extensions = wire
            .rest
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect();

        Self {
            document_hash: wire.document_hash,
            root_hash: wire.root_hash,
            nft_id: wire.nft_id,
            verify_url: wire.verify_url,
            proofs: wire
                .proofs
                .into_iter()
                .map(|(key, proof)| (key, raw_proof(proof)))
                .collect(),
            issuer_address: wire.issuer_address,
            holder_address: wire.holder_address,
            extensions,
        }
    }
}

/// Steps of one wire proof. A non-array proof becomes a single step that
/// fails to decode, so the field reports a format error.
fn raw_proof(proof: Value) -> Vec<RawProofStep> {
    match proof {
        Value::Array(steps) => steps.into_iter().map(RawProofStep::from_json).collect(),
        other => vec![RawProofStep::from_json(other)],
    }
}

impl CertificateMetadata {
    /// Decode the metadata JSON object.
    pub fn from_json(json: &str) -> VerifyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode either bare metadata or a full ledger asset response.
    pub fn from_any_json(json: &str) -> VerifyResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        if value.get("data").is_some() && value.get("code").is_some() {
            let response: LedgerAssetResponse = serde_json::from_value(value)?;
            response.into_metadata()
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Field names that carry a proof, in key order.
    pub fn field_names(&self) -> Vec<&str> {
        self.proofs
            .keys()
            .filter_map(|key| key.strip_suffix(PROOF_KEY_SUFFIX))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Proof for a field, if the metadata carries one.
    pub fn proof_for(&self, field_name: &str) -> Option<&[RawProofStep]> {
        self.proofs
            .get(&format!("{}{}", field_name, PROOF_KEY_SUFFIX))
            .map(Vec::as_slice)
    }
}

// =============================================================================
// LEDGER RESPONSE ENVELOPE
// =============================================================================

/// Asset lookup response from the ledger API.
///
/// The metadata itself travels as a JSON string inside `data.asset.metadata`.
#[derive(Clone, Debug, Deserialize)]
pub struct LedgerAssetResponse {
    /// Response payload.
    #[serde(default)]
    pub data: Option<LedgerAssetData>,
    /// Error message, empty on success.
    #[serde(default)]
    pub error: String,
    /// Status code, `"successful"` on success.
    #[serde(default)]
    pub code: String,
}

/// Payload wrapper.
#[derive(Clone, Debug, Deserialize)]
pub struct LedgerAssetData {
    /// The asset record.
    #[serde(default)]
    pub asset: Option<LedgerAsset>,
}

/// Asset record fields this crate reads.
#[derive(Clone, Debug, Deserialize)]
pub struct LedgerAsset {
    /// Embedded metadata JSON string.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Issuer address.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Creator address.
    #[serde(default)]
    pub creator: Option<String>,
    /// Owner address.
    #[serde(rename = "ownerAddress", default)]
    pub owner_address: Option<String>,
}

impl LedgerAssetResponse {
    /// Unwrap and decode the embedded metadata.
    ///
    /// The issuer address is taken from `issuer`, then `creator`, then
    /// `ownerAddress`, overriding anything embedded in the metadata.
    pub fn into_metadata(self) -> VerifyResult<CertificateMetadata> {
        let asset = self.data.and_then(|d| d.asset);
        let raw = asset.as_ref().and_then(|a| a.metadata.as_deref());

        let raw = match raw {
            Some(raw) if self.code == LEDGER_SUCCESS => raw,
            _ => {
                let reason = if self.error.is_empty() {
                    "invalid NFT metadata response".to_string()
                } else {
                    self.error
                };
                return Err(VerifyError::LedgerRejected(reason));
            }
        };

        let mut metadata = CertificateMetadata::from_json(raw)?;

        let issuer = asset.as_ref().and_then(|a| {
            a.issuer
                .clone()
                .or_else(|| a.creator.clone())
                .or_else(|| a.owner_address.clone())
        });
        if issuer.is_some() {
            metadata.issuer_address = issuer;
        }

        Ok(metadata)
    }
}
