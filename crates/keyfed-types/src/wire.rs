//! Request and response types of the federation fetch protocol.
//!
//! Field names follow the protocol's camelCase spelling on the wire.
//! Diagnosis key bytes are carried as standard base64 strings.

use serde::{Deserialize, Serialize};

use crate::DiagnosisStatus;

/// A peer's request for keys published since its last fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchRequest {
    /// Regions to include. Empty means all regions.
    pub region_identifiers: Vec<String>,
    /// Regions to exclude.
    pub exclude_region_identifiers: Vec<String>,
    /// High-watermark from the previous response, epoch seconds (exclusive).
    pub last_fetch_response_key_timestamp: i64,
    /// Continuation token from a previous partial response. Empty to start
    /// from the beginning.
    pub next_fetch_token: String,
}

/// The result of one fetch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    /// Key groups, one per distinct region set, in first-seen order.
    pub response: Vec<ContactTracingResponse>,
    /// Largest creation timestamp among the returned keys; the caller's
    /// next `lastFetchResponseKeyTimestamp`.
    pub fetch_response_key_timestamp: i64,
    /// Set when the server stopped early because its time budget ran out.
    pub partial_response: bool,
    /// Resumption token, meaningful only when `partial_response` is set.
    pub next_fetch_token: String,
}

/// All keys sharing one region set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactTracingResponse {
    /// Region codes, sorted ascending.
    pub region_identifiers: Vec<String>,
    pub contact_tracing_info: Vec<ContactTracingInfo>,
}

/// Keys sharing a region set, diagnosis status and verification authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactTracingInfo {
    pub diagnosis_status: DiagnosisStatus,
    pub verification_authority_name: String,
    pub diagnosis_keys: Vec<DiagnosisKey>,
}

/// A single exposure key and the intervals it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisKey {
    #[serde(with = "base64_bytes")]
    pub diagnosis_key: Vec<u8>,
    pub interval_number: i32,
    pub interval_count: i32,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
