//! Federation fetch for the keyfed server.
//!
//! A federation partner periodically asks for every diagnosis key this
//! server has published since its last fetch, optionally narrowed to some
//! regions and with others excluded. [`fetch`] answers one such request:
//!
//! 1. region codes are normalized ([`region`]);
//! 2. a storage scan is opened from the derived criteria ([`criteria`]);
//! 3. each record is checked ([`filter`]) and grouped ([`aggregate`]);
//! 4. before each record a caller-supplied [`FetchSignal`] is polled, and a
//!    deadline turns into a partial response carrying a resumption token.
//!
//! Federation is pull-only and bilateral. Only locally published keys are
//! ever returned, so keys received from one partner are never passed on to
//! another.

pub mod aggregate;
pub mod criteria;
pub mod fetch;
pub mod filter;
pub mod region;
pub mod signal;

pub use aggregate::Aggregator;
pub use criteria::{build_criteria, truncate_window};
pub use fetch::{fetch, FetchError};
pub use filter::{RecordFilter, SkipReason};
pub use region::normalize_regions;
pub use signal::{FetchSignal, RequestContext, StopReason};
