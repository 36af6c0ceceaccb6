//! Acknowledgments returned from value delivery.
//!
//! An [`Ack`] answers every `on_next`: either the consumer is ready for the
//! next value ([`Ack::Continue`]) or it wants no more ([`Ack::Stop`]). The
//! answer is available immediately, or later through a [`Deferred`] handle
//! ([`Ack::Async`]) that settles to a [`SyncAck`] or to a failure.
//!
//! # Fast path
//!
//! Producers emitting millions of values synchronously must not pay for a
//! deferred handle per value. Every combinator here checks the two
//! synchronous constants first and only touches the deferred machinery for
//! `Ack::Async`.
//!
//! # Invariant
//!
//! Once a `Stop` is observed, synchronously or through settlement of a
//! deferred handle, no further value may be emitted on that subscription.

use crate::deferred::{Deferred, Settled};
use crate::runtime::Scheduler;
use core::fmt;

/// A resolved acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncAck {
    /// The consumer accepted the value and is ready for the next one.
    Continue,
    /// The consumer will accept no further values.
    Stop,
}

impl SyncAck {
    /// Returns true for `Continue`.
    #[must_use]
    pub const fn is_continue(self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns true for `Stop`.
    #[must_use]
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl fmt::Display for SyncAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("Continue"),
            Self::Stop => f.write_str("Stop"),
        }
    }
}

/// An acknowledgment, resolved now or later.
#[derive(Clone)]
pub enum Ack {
    /// Synchronous `Continue`.
    Continue,
    /// Synchronous `Stop`.
    Stop,
    /// An acknowledgment that settles later, possibly with a failure.
    Async(Deferred<SyncAck>),
}

impl Ack {
    /// Wraps a deferred acknowledgment.
    #[must_use]
    pub fn deferred(ack: Deferred<SyncAck>) -> Self {
        Self::Async(ack)
    }

    /// Returns true for the two synchronous constants.
    #[must_use]
    pub const fn is_sync(&self) -> bool {
        !matches!(self, Self::Async(_))
    }

    /// Returns true only for a synchronous `Continue`.
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns true only for a synchronous `Stop`.
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    /// Returns the resolved value of a synchronous ack.
    #[must_use]
    pub const fn as_sync(&self) -> Option<SyncAck> {
        match self {
            Self::Continue => Some(SyncAck::Continue),
            Self::Stop => Some(SyncAck::Stop),
            Self::Async(_) => None,
        }
    }

    /// Runs `callback` with the resolved outcome and returns `self` unchanged.
    ///
    /// Synchronous acks invoke the callback on the calling stack before this
    /// method returns. Asynchronous acks register it on the deferred handle.
    pub fn on_resolved<F>(self, callback: F) -> Self
    where
        F: FnOnce(Settled<SyncAck>) + Send + 'static,
    {
        match &self {
            Self::Continue => callback(Ok(SyncAck::Continue)),
            Self::Stop => callback(Ok(SyncAck::Stop)),
            Self::Async(deferred) => deferred.on_settled(callback),
        }
        self
    }

    /// Runs `callback` if and only if this ack is, or settles to, `Continue`.
    ///
    /// `Stop` and failures are silent no-ops.
    pub fn on_continue<F>(self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        match &self {
            Self::Continue => callback(),
            Self::Stop => {}
            Self::Async(deferred) => deferred.on_settled(move |outcome| {
                if matches!(outcome, Ok(SyncAck::Continue)) {
                    callback();
                }
            }),
        }
        self
    }

    /// Runs `callback` if this ack is, or settles to, `Stop` or a failure.
    pub fn on_stop_or_failure<F>(self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        match &self {
            Self::Continue => {}
            Self::Stop => callback(),
            Self::Async(deferred) => deferred.on_settled(move |outcome| {
                if !matches!(outcome, Ok(SyncAck::Continue)) {
                    callback();
                }
            }),
        }
        self
    }

    /// Collapses an already-settled deferred ack into its synchronous value.
    ///
    /// Never waits. A settled failure is sent to the scheduler's failure sink
    /// and replaced by `Stop`; a pending handle is returned unchanged.
    #[must_use]
    pub fn flatten_if_resolved(self, scheduler: &dyn Scheduler) -> Self {
        let Self::Async(deferred) = &self else {
            return self;
        };
        match deferred.peek() {
            None => self,
            Some(Ok(ack)) => ack.into(),
            Some(Err(failure)) => {
                scheduler.report_failure(failure);
                Self::Stop
            }
        }
    }
}

impl From<SyncAck> for Ack {
    fn from(ack: SyncAck) -> Self {
        match ack {
            SyncAck::Continue => Self::Continue,
            SyncAck::Stop => Self::Stop,
        }
    }
}

impl From<Deferred<SyncAck>> for Ack {
    fn from(ack: Deferred<SyncAck>) -> Self {
        Self::Async(ack)
    }
}

impl PartialEq for Ack {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Continue, Self::Continue) | (Self::Stop, Self::Stop) => true,
            (Self::Async(a), Self::Async(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("Continue"),
            Self::Stop => f.write_str("Stop"),
            Self::Async(deferred) => f.debug_tuple("Async").field(deferred).finish(),
        }
    }
}
