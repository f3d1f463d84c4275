//! Issuer Trust Registry
//!
//! Immutable table of known certificate issuers with their trust tier and
//! validity window. Built once at startup and passed by reference to
//! whatever needs issuer lookups.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of organization behind an issuer address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerKind {
    /// Degree-granting university.
    University,
    /// Other educational institution.
    Institution,
    /// Commercial company.
    Company,
    /// Foundation or non-profit.
    Foundation,
    /// Individual instructor.
    Individual,
}

/// Trust tier, ordered from least to most trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    /// Unknown or not currently valid.
    Unverified,
    /// Registered, full verification pending.
    Bronze,
    /// Verified organization.
    Silver,
    /// Verified educational institution.
    Gold,
}

impl VerificationLevel {
    /// User-facing description of the tier.
    pub fn message(self) -> &'static str {
        match self {
            Self::Gold => "Verified Educational Institution",
            Self::Silver => "Verified Organization",
            Self::Bronze => "Registered Issuer (Pending Full Verification)",
            Self::Unverified => "Unverified Issuer",
        }
    }

    /// Gold and silver issuers are trusted outright.
    pub fn is_trusted(self) -> bool {
        matches!(self, Self::Gold | Self::Silver)
    }
}

/// Registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerInfo {
    /// Ledger address (matched case-insensitively).
    pub address: String,
    /// Display name.
    pub name: String,
    /// Organization kind.
    #[serde(rename = "type")]
    pub kind: IssuerKind,
    /// Trust tier.
    #[serde(rename = "verificationLevel")]
    pub level: VerificationLevel,
    /// First day the entry is valid.
    #[serde(rename = "validFrom")]
    pub valid_from: NaiveDate,
    /// Last day the entry is valid, if it expires.
    #[serde(rename = "validUntil", default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
    /// Website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Country of operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Accrediting bodies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accreditation: Vec<String>,
}

/// Outcome of an issuer lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IssuerVerdict {
    /// Issuer is known, currently valid and above `Unverified`.
    pub verified: bool,
    /// Effective tier (`Unverified` when unknown or out of window).
    pub level: VerificationLevel,
    /// Registry entry, when the address is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<IssuerInfo>,
    /// User-facing explanation.
    pub message: String,
}

impl IssuerVerdict {
    /// Verdict for a certificate with no issuer address.
    pub fn missing_address() -> Self {
        Self::unverified(None, "Issuer address not available in certificate data")
    }

    fn unverified(issuer: Option<IssuerInfo>, message: &str) -> Self {
        Self {
            verified: false,
            level: VerificationLevel::Unverified,
            issuer,
            message: message.to_string(),
        }
    }

    /// Trusted outright (gold or silver).
    pub fn is_trusted(&self) -> bool {
        self.verified && self.level.is_trusted()
    }
}

/// Registry construction errors.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// Two entries share an address.
    #[error("duplicate issuer address: {0}")]
    DuplicateAddress(String),

    /// An entry's window ends before it starts.
    #[error("issuer {0} has validUntil before validFrom")]
    InvertedWindow(String),

    /// Registry JSON failed to decode.
    #[error("registry decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Immutable issuer lookup table.
#[derive(Clone, Debug, Default)]
pub struct IssuerRegistry {
    issuers: BTreeMap<String, IssuerInfo>,
}

impl IssuerRegistry {
    /// Build a registry, rejecting duplicate addresses and inverted windows.
    pub fn new(entries: impl IntoIterator<Item = IssuerInfo>) -> Result<Self, IssuerError> {
        let mut issuers = BTreeMap::new();
        for entry in entries {
            if matches!(entry.valid_until, Some(until) if until < entry.valid_from) {
                return Err(IssuerError::InvertedWindow(entry.address));
            }
            let key = entry.address.to_lowercase();
            if issuers.contains_key(&key) {
                return Err(IssuerError::DuplicateAddress(entry.address));
            }
            issuers.insert(key, entry);
        }
        Ok(Self { issuers })
    }

    /// Decode a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, IssuerError> {
        let entries: Vec<IssuerInfo> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Registry shipped with the verifier.
    pub fn builtin() -> Self {
        let valid_from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN);
        let academy = |address: &str, name: &str, description: &str| IssuerInfo {
            address: address.to_string(),
            name: name.to_string(),
            kind: IssuerKind::Foundation,
            level: VerificationLevel::Gold,
            valid_from,
            valid_until: None,
            website: Some("https://klever.org".to_string()),
            description: Some(description.to_string()),
            country: Some("Global".to_string()),
            accreditation: vec!["Education Authority".to_string()],
        };

        let entries = [
            academy(
                "klv1graf3wqa8eefzmp3g95wrnmayzacsje2a6c6y7z6zmu9m8z8gz5qlrctat",
                "Klever Academy - Testing Issuer",
                "Official TEST Klever Foundation Academy",
            ),
            academy(
                "klv1a9wfngw5chea5myr6wmdf9hs50v5hpzmk5fzg4h6pjvk4l9gg5yszuecfs",
                "Klever Academy",
                "Official Klever Foundation Academy",
            ),
        ];

        Self {
            issuers: entries
                .into_iter()
                .map(|entry| (entry.address.to_lowercase(), entry))
                .collect(),
        }
    }

    /// Look up an issuer by address.
    pub fn get(&self, address: &str) -> Option<&IssuerInfo> {
        self.issuers.get(&address.trim().to_lowercase())
    }

    /// Evaluate an issuer address on a given day.
    pub fn verify(&self, address: &str, today: NaiveDate) -> IssuerVerdict {
        let Some(issuer) = self.get(address) else {
            return IssuerVerdict::unverified(
                None,
                "Unknown issuer - Certificate issued by unverified entity",
            );
        };

        if today < issuer.valid_from {
            return IssuerVerdict::unverified(Some(issuer.clone()), "Issuer verification not yet valid");
        }
        if matches!(issuer.valid_until, Some(until) if today > until) {
            return IssuerVerdict::unverified(Some(issuer.clone()), "Issuer verification has expired");
        }

        IssuerVerdict {
            verified: issuer.level != VerificationLevel::Unverified,
            level: issuer.level,
            issuer: Some(issuer.clone()),
            message: issuer.level.message().to_string(),
        }
    }

    /// Evaluate an optional address.
    pub fn verify_optional(&self, address: Option<&str>, today: NaiveDate) -> IssuerVerdict {
        match address {
            Some(address) => self.verify(address, today),
            None => IssuerVerdict::missing_address(),
        }
    }

    /// All entries.
    pub fn all(&self) -> impl Iterator<Item = &IssuerInfo> {
        self.issuers.values()
    }

    /// Entries at a given tier.
    pub fn by_level(&self, level: VerificationLevel) -> impl Iterator<Item = &IssuerInfo> {
        self.issuers.values().filter(move |issuer| issuer.level == level)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    /// True for an empty registry.
    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACADEMY: &str = "klv1a9wfngw5chea5myr6wmdf9hs50v5hpzmk5fzg4h6pjvk4l9gg5yszuecfs";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(address: &str, level: VerificationLevel, until: Option<NaiveDate>) -> IssuerInfo {
        IssuerInfo {
            address: address.to_string(),
            name: format!("Issuer {}", address),
            kind: IssuerKind::University,
            level,
            valid_from: day(2024, 1, 1),
            valid_until: until,
            website: None,
            description: None,
            country: None,
            accreditation: Vec::new(),
        }
    }

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let registry = IssuerRegistry::builtin();
        assert_eq!(registry.len(), 2);
        let issuer = registry.get(&ACADEMY.to_uppercase()).unwrap();
        assert_eq!(issuer.name, "Klever Academy");
    }

    #[test]
    fn test_gold_issuer_verified() {
        let verdict = IssuerRegistry::builtin().verify(ACADEMY, day(2025, 6, 1));
        assert!(verdict.verified);
        assert!(verdict.is_trusted());
        assert_eq!(verdict.level, VerificationLevel::Gold);
        assert_eq!(verdict.message, "Verified Educational Institution");
    }

    #[test]
    fn test_not_yet_valid() {
        let verdict = IssuerRegistry::builtin().verify(ACADEMY, day(2024, 12, 31));
        assert!(!verdict.verified);
        assert_eq!(verdict.level, VerificationLevel::Unverified);
        assert_eq!(verdict.message, "Issuer verification not yet valid");
        assert!(verdict.issuer.is_some());
    }

    #[test]
    fn test_expired() {
        let registry =
            IssuerRegistry::new([entry("klv1old", VerificationLevel::Silver, Some(day(2024, 6, 30)))])
                .unwrap();
        assert!(registry.verify("klv1old", day(2024, 6, 30)).verified);
        let verdict = registry.verify("klv1old", day(2024, 7, 1));
        assert!(!verdict.verified);
        assert_eq!(verdict.message, "Issuer verification has expired");
    }

    #[test]
    fn test_unknown_and_missing_issuer() {
        let registry = IssuerRegistry::builtin();
        let unknown = registry.verify("klv1nobody", day(2025, 6, 1));
        assert!(!unknown.verified);
        assert!(unknown.issuer.is_none());

        let missing = registry.verify_optional(None, day(2025, 6, 1));
        assert_eq!(missing.message, "Issuer address not available in certificate data");
    }

    #[test]
    fn test_bronze_verified_but_not_trusted() {
        let registry = IssuerRegistry::new([entry("klv1new", VerificationLevel::Bronze, None)]).unwrap();
        let verdict = registry.verify("klv1new", day(2025, 1, 1));
        assert!(verdict.verified);
        assert!(!verdict.is_trusted());
    }

    #[test]
    fn test_duplicate_and_inverted_rejected() {
        let dup = IssuerRegistry::new([
            entry("klv1a", VerificationLevel::Gold, None),
            entry("KLV1A", VerificationLevel::Silver, None),
        ]);
        assert!(matches!(dup, Err(IssuerError::DuplicateAddress(_))));

        let inverted = IssuerRegistry::new([entry("klv1b", VerificationLevel::Gold, Some(day(2023, 1, 1)))]);
        assert!(matches!(inverted, Err(IssuerError::InvertedWindow(_))));
    }

    #[test]
    fn test_from_json_and_by_level() {
        let json = r#"[
            {"address": "klv1g", "name": "G", "type": "university",
             "verificationLevel": "gold", "validFrom": "2025-01-01"},
            {"address": "klv1s", "name": "S", "type": "company",
             "verificationLevel": "silver", "validFrom": "2025-01-01",
             "validUntil": "2026-01-01"}
        ]"#;
        let registry = IssuerRegistry::from_json(json).unwrap();
        assert_eq!(registry.by_level(VerificationLevel::Gold).count(), 1);
        assert_eq!(registry.all().count(), 2);
    }

    #[test]
    fn test_level_ordering() {
        assert!(VerificationLevel::Gold > VerificationLevel::Silver);
        assert!(VerificationLevel::Bronze > VerificationLevel::Unverified);
    }
}
