use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::DaoError;

/// Per-call context carrying cancellation and an optional deadline
///
/// Every runtime operation checks the context before each store call and
/// hands it to the store, so a backend can apply its own timeouts.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

/// Handle used to cancel a [`Context`] from elsewhere
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Time left in whole milliseconds, rounded up and at least 1
    ///
    /// Suited to server-side statement limits, where 0 means "no limit".
    pub fn timeout_millis(&self) -> Option<u64> {
        self.remaining().map(|left| {
            let millis = left.as_nanos().div_ceil(1_000_000);
            u64::try_from(millis).unwrap_or(u64::MAX).max(1)
        })
    }

    /// Fail if the context was cancelled or its deadline has passed
    pub fn check(&self) -> Result<(), DaoError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(DaoError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DaoError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
