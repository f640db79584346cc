//! The scan contract between the fetch core and the storage engine.

use keyfed_types::InfectionRecord;

use crate::error::StoreError;

/// Which records a federation scan should visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchInfectionsCriteria {
    /// Only records created strictly after this epoch second.
    pub since_timestamp: i64,
    /// Only records created strictly before this epoch second.
    pub until_timestamp: i64,
    /// Restrict to records carrying this region. A hint: callers must still
    /// check region membership themselves.
    pub include_region: Option<String>,
    /// Continuation token from a previous scan, or empty to start over.
    pub last_cursor: String,
    /// Skip records received from federation partners.
    pub only_local_provenance: bool,
}

/// One step of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorStep {
    /// A record, or `None` when the engine had nothing usable to yield this
    /// step (such as a row that failed to decode) but is not finished.
    Record(Option<InfectionRecord>),
    /// The scan is complete.
    Exhausted,
}

/// A resumable, forward-only scan over stored infection records.
pub trait InfectionIterator {
    /// Advances the scan by one step.
    fn next(&mut self) -> Result<IteratorStep, StoreError>;

    /// Returns an opaque token for the position after the last record
    /// yielded by [`InfectionIterator::next`]. Passing it back as
    /// [`FetchInfectionsCriteria::last_cursor`] resumes from that point.
    fn cursor(&self) -> Result<String, StoreError>;
}

impl<I: InfectionIterator + ?Sized> InfectionIterator for Box<I> {
    fn next(&mut self) -> Result<IteratorStep, StoreError> {
        (**self).next()
    }

    fn cursor(&self) -> Result<String, StoreError> {
        (**self).cursor()
    }
}
