#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use keyfed_db::{InfectionIterator, IteratorStep, StoreError};
use keyfed_federation::{FetchSignal, StopReason};
use keyfed_types::{DiagnosisStatus, InfectionRecord};

pub fn record(key: &str, regions: &[&str], created_at: i64) -> InfectionRecord {
    InfectionRecord {
        key_id: key.to_string(),
        diagnosis_key: key.as_bytes().to_vec(),
        regions: regions.iter().map(|r| r.to_string()).collect(),
        local_provenance: true,
        diagnosis_status: DiagnosisStatus::ConfirmedTest.as_i32(),
        verification_authority_name: "AUTH".to_string(),
        interval_number: 2_650_000,
        interval_count: 144,
        created_at,
    }
}

/// An iterator that replays a fixed list of steps.
///
/// Its cursor is `after-N`, where N counts records handed out so far.
pub struct ScriptedIterator {
    steps: VecDeque<Result<IteratorStep, StoreError>>,
    handed_out: usize,
    fail_cursor: bool,
    pulls: Rc<Cell<usize>>,
}

impl ScriptedIterator {
    pub fn new(steps: Vec<Result<IteratorStep, StoreError>>) -> Self {
        Self {
            steps: steps.into(),
            handed_out: 0,
            fail_cursor: false,
            pulls: Rc::new(Cell::new(0)),
        }
    }

    pub fn of_records(records: Vec<InfectionRecord>) -> Self {
        Self::new(
            records
                .into_iter()
                .map(|r| Ok(IteratorStep::Record(Some(r))))
                .collect(),
        )
    }

    pub fn failing_cursor(mut self) -> Self {
        self.fail_cursor = true;
        self
    }

    /// Shared count of `next` calls, readable after the iterator is gone.
    pub fn pulls(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.pulls)
    }
}

impl InfectionIterator for ScriptedIterator {
    fn next(&mut self) -> Result<IteratorStep, StoreError> {
        self.pulls.set(self.pulls.get() + 1);
        match self.steps.pop_front() {
            Some(Ok(IteratorStep::Record(Some(r)))) => {
                self.handed_out += 1;
                Ok(IteratorStep::Record(Some(r)))
            }
            Some(step) => step,
            None => Ok(IteratorStep::Exhausted),
        }
    }

    fn cursor(&self) -> Result<String, StoreError> {
        if self.fail_cursor {
            return Err(StoreError::InvalidCursor("cursor unavailable".to_string()));
        }
        Ok(format!("after-{}", self.handed_out))
    }
}

/// A signal that stays quiet for a number of polls, then fires.
pub struct StopAfterPolls {
    remaining: Cell<usize>,
    reason: StopReason,
}

impl StopAfterPolls {
    pub fn new(quiet_polls: usize, reason: StopReason) -> Self {
        Self {
            remaining: Cell::new(quiet_polls),
            reason,
        }
    }
}

impl FetchSignal for StopAfterPolls {
    fn poll(&self) -> Option<StopReason> {
        match self.remaining.get() {
            0 => Some(self.reason.clone()),
            n => {
                self.remaining.set(n - 1);
                None
            }
        }
    }
}

/// A signal that never fires.
pub struct Never;

impl FetchSignal for Never {
    fn poll(&self) -> Option<StopReason> {
        None
    }
}
