//! Grouping of eligible records into the nested response shape.

use std::collections::HashMap;

use keyfed_types::{
    ContactTracingInfo, ContactTracingResponse, DiagnosisKey, DiagnosisStatus, FetchResponse,
    InfectionRecord,
};

/// Folds records into a [`FetchResponse`], one group per region set and one
/// sub-group per (region set, status, authority).
///
/// Both levels are append-only vectors indexed by a key map, so groups keep
/// the order in which they were first seen.
#[derive(Debug, Default)]
pub struct Aggregator {
    response: FetchResponse,
    /// Sorted region set -> index into `response.response`.
    groups: HashMap<Vec<String>, usize>,
    /// (group index, status, authority) -> index into that group's infos.
    infos: HashMap<(usize, DiagnosisStatus, String), usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one eligible record.
    pub fn add(&mut self, record: InfectionRecord, status: DiagnosisStatus) {
        let InfectionRecord {
            diagnosis_key,
            mut regions,
            verification_authority_name,
            interval_number,
            interval_count,
            created_at,
            ..
        } = record;

        regions.sort();

        let group = match self.groups.get(&regions) {
            Some(&idx) => idx,
            None => {
                let idx = self.response.response.len();
                self.response.response.push(ContactTracingResponse {
                    region_identifiers: regions.clone(),
                    contact_tracing_info: Vec::new(),
                });
                self.groups.insert(regions, idx);
                idx
            }
        };

        let infos = &mut self.response.response[group].contact_tracing_info;
        let info_key = (group, status, verification_authority_name);
        let info = match self.infos.get(&info_key) {
            Some(&idx) => idx,
            None => {
                let idx = infos.len();
                infos.push(ContactTracingInfo {
                    diagnosis_status: status,
                    verification_authority_name: info_key.2.clone(),
                    diagnosis_keys: Vec::new(),
                });
                self.infos.insert(info_key, idx);
                idx
            }
        };

        infos[info].diagnosis_keys.push(DiagnosisKey {
            diagnosis_key,
            interval_number,
            interval_count,
        });

        self.response.fetch_response_key_timestamp =
            self.response.fetch_response_key_timestamp.max(created_at);
    }

    /// Number of distinct region-set groups so far.
    pub fn group_count(&self) -> usize {
        self.response.response.len()
    }

    /// Returns the assembled response. Paging fields are left unset.
    pub fn finish(self) -> FetchResponse {
        self.response
    }
}
