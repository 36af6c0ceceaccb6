//! Cooperative cancellation for running subscriptions.
//!
//! A [`CancellationToken`] is the handle returned from every attach. It is
//! shared between the caller holding the subscription and the delivery loop,
//! which polls it before each emission. Cancelling is:
//!
//! - **idempotent**: only the first call records its reason;
//! - **irreversible**: there is no way back to the active state;
//! - **silent**: it never triggers `on_complete` or `on_error`;
//! - **cooperative**: a value already handed to `on_next` finishes its ack
//!   handling, but no further value is emitted afterwards.
//!
//! Reads never block and never take a lock.

use crate::tracing_compat::debug;
use crate::types::CancelReason;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

struct Latch {
    cancelled: AtomicBool,
    reason: OnceLock<CancelReason>,
}

/// Shared, thread-safe cancellation latch.
///
/// # Example
///
/// ```
/// use ackstream::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// assert!(!observer.is_cancelled());
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    latch: Arc<Latch>,
}

impl CancellationToken {
    /// Creates an active token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latch: Arc::new(Latch {
                cancelled: AtomicBool::new(false),
                reason: OnceLock::new(),
            }),
        }
    }

    /// Creates a token for a subscription that has already finished.
    ///
    /// Cancelling it is harmless; nothing polls it.
    #[must_use]
    pub fn inert() -> Self {
        Self::new()
    }

    /// Cancels without a note. Returns true if this call cancelled the token.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::unspecified())
    }

    /// Cancels with `reason`. Returns true if this call cancelled the token.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        let first = self.latch.reason.set(reason).is_ok();
        self.latch.cancelled.store(true, Ordering::Release);
        if first {
            debug!(reason = ?self.latch.reason.get(), "subscription cancelled");
        }
        first
    }

    /// Returns true once the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.latch.cancelled.load(Ordering::Acquire)
    }

    /// Returns the reason recorded by the first cancellation.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            self.latch.reason.get().cloned()
        } else {
            None
        }
    }

    /// Returns true if both tokens share the same latch.
    #[must_use]
    pub fn same_latch(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.latch, &other.latch)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
