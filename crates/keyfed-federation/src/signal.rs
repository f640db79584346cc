//! Caller-supplied stop signals for a fetch.
//!
//! A fetch never creates its own timeout. The caller hands in something
//! implementing [`FetchSignal`], and the fetch loop polls it once before
//! every record. Polling must not block.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Why a signal asked the fetch to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's time budget ran out.
    DeadlineExceeded,
    /// The caller revoked the request.
    Cancelled,
    /// Any other cause. The fetch treats this as fatal.
    Other(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Other(cause) => f.write_str(cause),
        }
    }
}

/// A non-blocking stop check.
pub trait FetchSignal {
    /// Returns `Some` once the fetch should stop.
    fn poll(&self) -> Option<StopReason>;
}

impl FetchSignal for CancellationToken {
    fn poll(&self) -> Option<StopReason> {
        self.is_cancelled().then_some(StopReason::Cancelled)
    }
}

/// A revocable token paired with an optional fixed deadline.
///
/// An explicit cancellation is reported ahead of an elapsed deadline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that stops only when `token` is cancelled.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context that also stops once `timeout` has elapsed from now.
    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl FetchSignal for RequestContext {
    fn poll(&self) -> Option<StopReason> {
        if self.token.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }
}
