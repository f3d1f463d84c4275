//! PDF Field Extraction
//!
//! Recovers certificate field values from a PDF's document information
//! dictionary, its `Custom` entries and its XMP properties. Issuers write
//! these inconsistently, so this stage is best-effort and returns a partial
//! mapping. Nothing it returns is trusted: every value still goes through
//! leaf commitment and proof replay like user-typed input.
//!
//! Parsing the PDF object structure itself is out of scope; callers hand in
//! the decoded string entries as [`PdfInfo`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::proof::leaf::Salt;

/// Field names extracted verbatim when a key normalizes to one of them.
const STANDARD_FIELDS: &[&str] = &[
    "name",
    "course",
    "instructor",
    "instructor_title",
    "date",
    "location",
    "salt",
    "issuer",
    "course_load",
];

/// Substrings that mark a non-standard key as worth keeping.
const RELEVANT_FRAGMENTS: &[&str] = &["name", "course", "instructor", "date", "salt"];

/// Custom entry holding `key|value||key|value` pairs.
const CERTIFICATE_DATA_KEY: &str = "CertificateData";

/// Title prefix identifying the generated certificate layout.
const TITLE_MARKER: &str = "CERTIFICADO";

/// Alternate key names some issuers use.
fn alias(normalized_key: &str) -> Option<&'static str> {
    match normalized_key {
        "course_name" => Some("course"),
        "instructor_name" => Some("instructor"),
        "issue_date" | "certificate_date" => Some("date"),
        "verification_salt" | "hash_salt" => Some("salt"),
        _ => None,
    }
}

/// Lowercase and replace dashes and spaces with underscores.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Decoded string entries of a PDF's metadata.
///
/// Decoding keeps only string-valued info entries and stringifies scalar
/// `Custom` and `XMP` values; anything else is dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WirePdfInfo")]
pub struct PdfInfo {
    /// Document information dictionary entries (`Title`, `Subject`, ...).
    #[serde(flatten)]
    pub info: BTreeMap<String, String>,
    /// Entries of the `Custom` sub-dictionary.
    #[serde(rename = "Custom", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
    /// XMP metadata properties.
    #[serde(rename = "XMP", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub xmp: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct WirePdfInfo {
    #[serde(rename = "Custom", default)]
    custom: Value,
    #[serde(rename = "XMP", default)]
    xmp: Value,
    #[serde(flatten)]
    info: BTreeMap<String, Value>,
}

impl From<WirePdfInfo> for PdfInfo {
    fn from(wire: WirePdfInfo) -> Self {
        let info = wire
            .info
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect();

        Self {
            info,
            custom: scalar_entries(wire.custom),
            xmp: scalar_entries(wire.xmp),
        }
    }
}

fn scalar_entries(value: Value) -> BTreeMap<String, String> {
    let Value::Object(map) = value else {
        return BTreeMap::new();
    };
    map.into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, b.to_string())),
            _ => None,
        })
        .collect()
}

/// Field values recovered from a PDF. Untrusted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    fields: BTreeMap<String, String>,
    salt: Option<Salt>,
}

impl ExtractedFields {
    /// Value for a field, if one was found.
    pub fn get(&self, field_name: &str) -> Option<&str> {
        self.fields.get(field_name).map(String::as_str)
    }

    /// Embedded certificate identifier.
    pub fn nft_id(&self) -> Option<&str> {
        self.get("nft_id")
    }

    /// Embedded salt, canonicalized.
    pub fn salt(&self) -> Option<&Salt> {
        self.salt.as_ref()
    }

    /// All recovered fields except the salt.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Number of recovered fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when nothing was recovered.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.salt.is_none()
    }

    fn set(&mut self, key: &str, value: &str) {
        if key == "salt" {
            self.salt = Salt::parse(value);
        } else {
            self.fields.insert(key.to_string(), value.to_string());
        }
    }

    fn set_if_absent(&mut self, key: &str, value: &str) {
        let present = if key == "salt" {
            self.salt.is_some()
        } else {
            self.fields.contains_key(key)
        };
        if !present {
            self.set(key, value);
        }
    }
}

/// Extract certificate fields from PDF metadata.
pub fn extract_fields(pdf: &PdfInfo) -> ExtractedFields {
    let mut out = ExtractedFields::default();

    for (key, value) in pdf.info.iter().filter(|(_, v)| !v.is_empty()) {
        extract_info_entry(&mut out, key, value);
    }

    if let Some(data) = pdf.custom.get(CERTIFICATE_DATA_KEY) {
        for (key, value) in parse_certificate_data(data) {
            out.set(&key, &value);
        }
    }

    for (key, value) in pdf.custom.iter().filter(|(k, v)| *k != CERTIFICATE_DATA_KEY && !v.is_empty()) {
        let normalized = normalize_key(key);
        out.set_if_absent(&normalized, value);
        if normalized == "salt" {
            out.set("salt", value);
        }
    }

    for (key, value) in pdf.xmp.iter().filter(|(_, v)| !v.is_empty()) {
        let normalized = normalize_key(key);
        let normalized = normalized.strip_prefix("pdf:").unwrap_or(&normalized);
        out.set_if_absent(normalized, value);
        if normalized == "salt" {
            out.set("salt", value);
        }
    }

    debug!(
        "Extracted {} fields from PDF metadata (salt present: {})",
        out.len(),
        out.salt.is_some()
    );

    out
}

fn extract_info_entry(out: &mut ExtractedFields, key: &str, value: &str) {
    // "CERTIFICADO ... - <holder name>"
    if key == "Title" {
        let parts: Vec<&str> = value.split(" - ").collect();
        if parts.len() == 2 && parts[0].contains(TITLE_MARKER) {
            out.set("name", parts[1].trim());
        }
    }

    if key == "Subject" {
        out.set("course", value);
    }

    if key == "Keywords" {
        if let Some(salt) = salt_from_keywords(value) {
            out.set("salt", salt);
        }
    }

    let normalized = normalize_key(key);
    if let Some(target) = alias(&normalized) {
        out.set(target, value);
    } else if STANDARD_FIELDS.contains(&normalized.as_str()) {
        out.set(&normalized, value);
    } else if RELEVANT_FRAGMENTS.iter().any(|f| normalized.contains(f)) {
        out.set(&normalized, value);
    }
}

/// Find `salt: <hex>` inside a keywords string.
fn salt_from_keywords(keywords: &str) -> Option<&str> {
    let start = keywords.find("salt:")? + "salt:".len();
    let rest = keywords[start..].trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

/// Split `key|value||key|value` into normalized pairs. Incomplete pairs are skipped.
fn parse_certificate_data(data: &str) -> Vec<(String, String)> {
    data.split("||")
        .filter_map(|pair| {
            let mut parts = pair.split('|');
            let key = parts.next()?.trim();
            let value = parts.next()?.trim();
            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((normalize_key(key), value.to_string()))
            }
        })
        .collect()
}
