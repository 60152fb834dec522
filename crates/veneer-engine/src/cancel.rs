//! Cooperative cancellation for native calls.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::FfiError;

/// A cancellation token checked once, at the invocation gate.
///
/// [`call_with_cancellation`](crate::call_with_cancellation) consults the
/// token before any marshalling happens; if it has been tripped, the call
/// returns [`FfiError::Cancelled`] without touching native code. Once the
/// trampoline has jumped, the call runs to completion — a partially
/// executed native call cannot be aborted safely, so there is no in-flight
/// cancellation.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelToken {
    /// Creates an untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token. The first recorded reason wins; later calls only
    /// keep the token tripped.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// The error a gated call would return, if the token is tripped.
    pub fn error(&self) -> Option<FfiError> {
        if !self.is_cancelled() {
            return None;
        }
        let reason = self
            .reason
            .lock()
            .clone()
            .unwrap_or_else(|| "cancelled".to_string());
        Some(FfiError::Cancelled { reason })
    }
}
