//! Shared types for the keyfed federation server.
//!
//! This crate holds the diagnosis-status enumeration, the stored infection
//! record shape, and the request/response types of the federation fetch
//! protocol. Every other crate in the workspace depends on it; it depends on
//! nothing internal.

use serde::{Deserialize, Serialize};

mod wire;

pub use wire::{
    ContactTracingInfo, ContactTracingResponse, DiagnosisKey, FetchRequest, FetchResponse,
};

/// Diagnosis status attached to a published key by its health authority.
///
/// The numeric codes are part of the federation protocol and are stored
/// verbatim in the database. A stored code outside this enumeration marks
/// the record as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum DiagnosisStatus {
    /// Status was not reported.
    Unknown = 0,
    /// Confirmed by a laboratory test.
    ConfirmedTest = 1,
    /// Diagnosed clinically without a test.
    ClinicalDiagnosis = 2,
    /// Reported by the user.
    SelfReport = 3,
    /// A negative test result.
    NegativeTest = 4,
    /// The user has recovered.
    Recovered = 5,
}

impl DiagnosisStatus {
    /// Returns the numeric protocol code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Converts a raw protocol code, returning `None` for unrecognized codes.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::ConfirmedTest),
            2 => Some(Self::ClinicalDiagnosis),
            3 => Some(Self::SelfReport),
            4 => Some(Self::NegativeTest),
            5 => Some(Self::Recovered),
            _ => None,
        }
    }

    /// Returns the canonical protocol label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::ConfirmedTest => "CONFIRMED_TEST",
            Self::ClinicalDiagnosis => "CLINICAL_DIAGNOSIS",
            Self::SelfReport => "SELF_REPORT",
            Self::NegativeTest => "NEGATIVE_TEST",
            Self::Recovered => "RECOVERED",
        }
    }
}

impl std::fmt::Display for DiagnosisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagnosisStatus {
    type Err = ParseDiagnosisStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "CONFIRMED_TEST" => Ok(Self::ConfirmedTest),
            "CLINICAL_DIAGNOSIS" => Ok(Self::ClinicalDiagnosis),
            "SELF_REPORT" => Ok(Self::SelfReport),
            "NEGATIVE_TEST" => Ok(Self::NegativeTest),
            "RECOVERED" => Ok(Self::Recovered),
            _ => Err(ParseDiagnosisStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown diagnosis status label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown diagnosis status: {0}")]
pub struct ParseDiagnosisStatusError(pub String);

/// A published diagnosis key as read back from storage.
///
/// Records are produced by the storage iterator and are read-only to the
/// fetch core. `diagnosis_status` is kept as the raw code so that records
/// carrying an unrecognized status can be detected and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfectionRecord {
    /// Opaque storage identifier, used only in log output.
    pub key_id: String,
    /// The diagnosis key bytes.
    pub diagnosis_key: Vec<u8>,
    /// Region codes the key was published for.
    pub regions: Vec<String>,
    /// Whether the record was published at this server (as opposed to
    /// being received from a federation partner).
    pub local_provenance: bool,
    /// Raw diagnosis status code.
    pub diagnosis_status: i32,
    /// Name of the authority that verified the diagnosis.
    pub verification_authority_name: String,
    /// First exposure interval covered by the key.
    pub interval_number: i32,
    /// Number of intervals covered by the key.
    pub interval_count: i32,
    /// Creation time, epoch seconds.
    pub created_at: i64,
}
