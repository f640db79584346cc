//! The federation fetch operation.

use keyfed_db::{FetchInfectionsCriteria, InfectionIterator, IteratorStep, StoreError};
use keyfed_types::{FetchRequest, FetchResponse};
use thiserror::Error;

use crate::aggregate::Aggregator;
use crate::criteria::build_criteria;
use crate::filter::RecordFilter;
use crate::region::normalize_regions;
use crate::signal::{FetchSignal, StopReason};

/// Fatal fetch failures. None of them return partial data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The storage scan could not be opened.
    #[error("querying infections (criteria: {criteria:?}): {source}")]
    Query {
        criteria: FetchInfectionsCriteria,
        source: StoreError,
    },
    /// The scan position could not be captured at a deadline stop.
    #[error("generating cursor: {0}")]
    Cursor(#[source] StoreError),
    /// The scan failed while advancing.
    #[error("iterating results: {0}")]
    Iteration(#[source] StoreError),
    /// The stop signal fired for a reason other than deadline or
    /// cancellation.
    #[error("context error: {0}")]
    UnexpectedCancellation(String),
}

/// How the record loop ended.
enum Outcome {
    Complete,
    Partial { cursor: String },
}

/// Runs one federation fetch.
///
/// Region lists are normalized, the scan is opened through `open`, and
/// records are filtered and grouped until the scan is exhausted or
/// `signal` asks to stop. A deadline or cancellation produces a successful
/// partial response whose `next_fetch_token` resumes the scan; every other
/// failure is returned as a [`FetchError`].
///
/// `fetch_until` is the exclusive upper creation-time bound, normally the
/// start of the current window.
///
/// # Errors
///
/// See [`FetchError`].
pub fn fetch<S, I, F>(
    signal: &S,
    mut req: FetchRequest,
    open: F,
    fetch_until: i64,
) -> Result<FetchResponse, FetchError>
where
    S: FetchSignal + ?Sized,
    I: InfectionIterator,
    F: FnOnce(&FetchInfectionsCriteria) -> Result<I, StoreError>,
{
    normalize_regions(&mut req);
    let criteria = build_criteria(&req, fetch_until);

    tracing::info!(
        regions = ?req.region_identifiers,
        excluding = ?req.exclude_region_identifiers,
        since = criteria.since_timestamp,
        until = criteria.until_timestamp,
        has_cursor = !req.next_fetch_token.is_empty(),
        "processing federation fetch request"
    );

    let filter = RecordFilter::new(&req.region_identifiers, &req.exclude_region_identifiers);

    let mut it = match open(&criteria) {
        Ok(it) => it,
        Err(source) => return Err(FetchError::Query { criteria, source }),
    };

    let mut aggregator = Aggregator::new();
    let mut keys = 0usize;
    let mut skipped = 0usize;

    let outcome = loop {
        if let Some(reason) = signal.poll() {
            match reason {
                StopReason::DeadlineExceeded | StopReason::Cancelled => {
                    let cursor = it.cursor().map_err(FetchError::Cursor)?;
                    tracing::info!(
                        %reason,
                        keys,
                        "fetch request reached its time limit, returning partial response"
                    );
                    break Outcome::Partial { cursor };
                }
                StopReason::Other(cause) => {
                    return Err(FetchError::UnexpectedCancellation(cause));
                }
            }
        }

        let record = match it.next().map_err(FetchError::Iteration)? {
            IteratorStep::Exhausted => break Outcome::Complete,
            IteratorStep::Record(None) => continue,
            IteratorStep::Record(Some(record)) => record,
        };

        match filter.check(&record) {
            Ok(status) => {
                aggregator.add(record, status);
                keys += 1;
            }
            Err(reason) => {
                tracing::debug!(key_id = %record.key_id, %reason, "skipping infection");
                skipped += 1;
            }
        }
    };

    let groups = aggregator.group_count();
    let mut response = aggregator.finish();
    if let Outcome::Partial { cursor } = outcome {
        response.partial_response = true;
        response.next_fetch_token = cursor;
    }

    tracing::debug!(
        groups,
        keys,
        skipped,
        partial = response.partial_response,
        high_watermark = response.fetch_response_key_timestamp,
        "federation fetch finished"
    );

    Ok(response)
}
