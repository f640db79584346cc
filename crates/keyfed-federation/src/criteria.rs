//! Storage query criteria for a fetch request.

use keyfed_db::FetchInfectionsCriteria;
use keyfed_types::FetchRequest;

/// Builds the scan criteria for a normalized request.
///
/// `fetch_until` is the start of the current, still-filling time window;
/// records at or after it are never returned. Results are always limited to
/// locally published records so that keys received from one partner are
/// never re-exported to another. When exactly one inclusion region was
/// requested it is passed down as a storage hint.
pub fn build_criteria(req: &FetchRequest, fetch_until: i64) -> FetchInfectionsCriteria {
    let include_region = match req.region_identifiers.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };

    FetchInfectionsCriteria {
        since_timestamp: req.last_fetch_response_key_timestamp,
        until_timestamp: fetch_until,
        include_region,
        last_cursor: req.next_fetch_token.clone(),
        only_local_provenance: true,
    }
}

/// Truncates `now` (epoch seconds) to the start of its window.
///
/// A non-positive `window_secs` disables truncation.
pub fn truncate_window(now: i64, window_secs: i64) -> i64 {
    if window_secs <= 0 {
        return now;
    }
    now - now.rem_euclid(window_secs)
}
