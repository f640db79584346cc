//! Per-record eligibility checks.
//!
//! Every record pulled from storage passes through [`RecordFilter::check`]
//! before it is grouped. A rejection is never an error: the caller logs the
//! [`SkipReason`] at debug level and moves on to the next record.

use std::collections::HashSet;

use keyfed_types::{DiagnosisStatus, InfectionRecord};

/// Why a record was left out of a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingDiagnosisKey,
    MissingRegions,
    NotLocalProvenance,
    InvalidDiagnosisStatus(i32),
    AllRegionsExcluded,
    NoRequestedRegion,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDiagnosisKey => f.write_str("missing diagnosis key"),
            Self::MissingRegions => f.write_str("missing regions"),
            Self::NotLocalProvenance => f.write_str("not local provenance"),
            Self::InvalidDiagnosisStatus(code) => write!(f, "invalid diagnosis status {code}"),
            Self::AllRegionsExcluded => f.write_str("contains only excluded regions"),
            Self::NoRequestedRegion => f.write_str("does not contain requested regions"),
        }
    }
}

/// The in-memory filter for one fetch call.
///
/// Region checks run here even when storage was given a single-region
/// hint, since storage is free to ignore it.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    included: HashSet<String>,
    excluded: HashSet<String>,
}

impl RecordFilter {
    /// Builds a filter from already-normalized region lists.
    pub fn new(included: &[String], excluded: &[String]) -> Self {
        Self {
            included: included.iter().cloned().collect(),
            excluded: excluded.iter().cloned().collect(),
        }
    }

    /// Checks a record, returning its parsed status when it is eligible.
    ///
    /// Checks run in a fixed order and the first failure wins. Exclusion
    /// drops a record only when every one of its regions is excluded;
    /// inclusion, when requested, needs at least one matching region. The
    /// two are independent.
    pub fn check(&self, record: &InfectionRecord) -> Result<DiagnosisStatus, SkipReason> {
        if record.diagnosis_key.is_empty() {
            return Err(SkipReason::MissingDiagnosisKey);
        }
        if record.regions.is_empty() {
            return Err(SkipReason::MissingRegions);
        }
        // Storage already restricts the scan; checked again so a query bug
        // can never re-federate a partner's keys.
        if !record.local_provenance {
            return Err(SkipReason::NotLocalProvenance);
        }
        let status = DiagnosisStatus::from_i32(record.diagnosis_status)
            .ok_or(SkipReason::InvalidDiagnosisStatus(record.diagnosis_status))?;

        if record.regions.iter().all(|r| self.excluded.contains(r)) {
            return Err(SkipReason::AllRegionsExcluded);
        }
        if !self.included.is_empty() && !record.regions.iter().any(|r| self.included.contains(r))
        {
            return Err(SkipReason::NoRequestedRegion);
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn record(codes: &[&str]) -> InfectionRecord {
        InfectionRecord {
            key_id: "k".to_string(),
            diagnosis_key: vec![7; 16],
            regions: regions(codes),
            local_provenance: true,
            diagnosis_status: DiagnosisStatus::ConfirmedTest.as_i32(),
            verification_authority_name: "AUTH".to_string(),
            interval_number: 1,
            interval_count: 1,
            created_at: 1,
        }
    }

    fn filter(include: &[&str], exclude: &[&str]) -> RecordFilter {
        RecordFilter::new(&regions(include), &regions(exclude))
    }

    #[test]
    fn accepts_a_well_formed_record() {
        assert_eq!(
            filter(&[], &[]).check(&record(&["US"])),
            Ok(DiagnosisStatus::ConfirmedTest)
        );
    }

    #[test]
    fn rejects_empty_key() {
        let mut r = record(&["US"]);
        r.diagnosis_key.clear();
        assert_eq!(
            filter(&[], &[]).check(&r),
            Err(SkipReason::MissingDiagnosisKey)
        );
    }

    #[test]
    fn rejects_empty_regions() {
        assert_eq!(
            filter(&[], &[]).check(&record(&[])),
            Err(SkipReason::MissingRegions)
        );
    }

    #[test]
    fn rejects_remote_provenance() {
        let mut r = record(&["US"]);
        r.local_provenance = false;
        assert_eq!(
            filter(&[], &[]).check(&r),
            Err(SkipReason::NotLocalProvenance)
        );
    }

    #[test]
    fn rejects_unrecognized_status_but_accepts_unknown() {
        let mut r = record(&["US"]);
        r.diagnosis_status = 42;
        assert_eq!(
            filter(&[], &[]).check(&r),
            Err(SkipReason::InvalidDiagnosisStatus(42))
        );

        r.diagnosis_status = 0;
        assert_eq!(filter(&[], &[]).check(&r), Ok(DiagnosisStatus::Unknown));
    }

    #[test]
    fn first_failing_check_wins() {
        let mut r = record(&[]);
        r.diagnosis_key.clear();
        r.local_provenance = false;
        assert_eq!(
            filter(&[], &[]).check(&r),
            Err(SkipReason::MissingDiagnosisKey)
        );
    }

    #[test]
    fn exclusion_and_inclusion_are_independent() {
        let r = record(&["A", "B"]);

        assert!(filter(&["B"], &["A"]).check(&r).is_ok());
        assert_eq!(
            filter(&["C"], &["A"]).check(&r),
            Err(SkipReason::NoRequestedRegion)
        );
        // B keeps the record visible; A still satisfies inclusion even though
        // it is excluded.
        assert_eq!(
            filter(&["A"], &["A"]).check(&r),
            Ok(DiagnosisStatus::ConfirmedTest)
        );
        assert_eq!(
            filter(&["A", "B"], &["A", "B"]).check(&r),
            Err(SkipReason::AllRegionsExcluded)
        );
        assert_eq!(
            filter(&[], &["A", "B"]).check(&r),
            Err(SkipReason::AllRegionsExcluded)
        );
    }

    #[test]
    fn inclusion_needs_one_match() {
        let r = record(&["A", "B"]);
        assert!(filter(&["A"], &[]).check(&r).is_ok());
        assert!(filter(&["Z", "B"], &[]).check(&r).is_ok());
        assert_eq!(
            filter(&["Z"], &[]).check(&r),
            Err(SkipReason::NoRequestedRegion)
        );
    }
}
