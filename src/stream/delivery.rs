//! The back-pressured delivery loop shared by every looping producer.
//!
//! A producer only describes *what* comes next through a [`Cursor`]; the
//! loop decides *when*. Each iteration:
//!
//! 1. stops silently if the subscription was cancelled;
//! 2. advances the cursor: end of input completes, a producer failure
//!    errors, otherwise the value is emitted;
//! 3. reacts to the acknowledgment:
//!    - `Stop` ends the subscription silently;
//!    - `Continue` completes if the cursor is exhausted, otherwise schedules
//!      the next iteration through [`Scheduler::trampoline`];
//!    - a deferred ack suspends the loop until it settles. A failure is
//!      forwarded to `on_error`, `Continue` resumes at step 1 and `Stop`
//!      ends silently.
//!
//! The loop never calls itself directly, so arbitrarily long runs of
//! synchronous `Continue` acks execute in bounded stack space.
//!
//! [`Scheduler::trampoline`]: crate::runtime::Scheduler::trampoline

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::runtime::SchedulerRef;
use crate::subscriber::BoxSubscriber;
use crate::tracing_compat::{debug, trace};
use crate::types::{Ack, SyncAck};
use std::sync::Arc;

/// The producer-specific half of a delivery loop.
pub trait Cursor: Send + 'static {
    /// Element type emitted downstream.
    type Item: 'static;

    /// Computes the next value.
    ///
    /// `None` ends the stream with `on_complete`; `Some(Err(_))` ends it with
    /// `on_error`.
    fn advance(&mut self) -> Option<Result<Self::Item, Error>>;

    /// Returns true if the next [`advance`](Self::advance) would yield `None`.
    ///
    /// Lets finite producers complete right after the last value instead of
    /// scheduling one more iteration.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// A running subscription driven by a [`Cursor`].
pub(crate) struct DeliveryLoop<C: Cursor> {
    cursor: C,
    downstream: BoxSubscriber<C::Item>,
    token: CancellationToken,
    scheduler: SchedulerRef,
    emitted: u64,
}

impl<C: Cursor> DeliveryLoop<C> {
    /// Runs the first iteration on the calling thread and returns the
    /// subscription's cancellation token.
    pub(crate) fn start(
        cursor: C,
        downstream: BoxSubscriber<C::Item>,
        scheduler: SchedulerRef,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        debug!(scheduler = scheduler.name(), "subscription started");
        Box::new(Self {
            cursor,
            downstream,
            token: token.clone(),
            scheduler,
            emitted: 0,
        })
        .run();
        token
    }

    fn run(mut self: Box<Self>) {
        if self.token.is_cancelled() {
            debug!(emitted = self.emitted, "delivery cancelled");
            return;
        }

        let value = match self.cursor.advance() {
            Some(Ok(value)) => value,
            Some(Err(error)) => {
                debug!(%error, emitted = self.emitted, "producer failed");
                self.downstream.on_error(error);
                return;
            }
            None => {
                self.complete();
                return;
            }
        };

        self.emitted += 1;
        match self.downstream.on_next(value) {
            Ack::Continue => {
                if !self.cursor.is_exhausted() {
                    self.schedule();
                } else if !self.token.is_cancelled() {
                    self.complete();
                }
            }
            Ack::Stop => {
                debug!(emitted = self.emitted, "downstream stopped");
            }
            Ack::Async(deferred) => {
                trace!(emitted = self.emitted, "suspended on deferred ack");
                deferred.on_settled(move |outcome| match outcome {
                    Ok(SyncAck::Continue) => {
                        trace!(emitted = self.emitted, "resumed");
                        self.schedule();
                    }
                    Ok(SyncAck::Stop) => {
                        debug!(emitted = self.emitted, "downstream stopped");
                    }
                    Err(error) => {
                        debug!(%error, "deferred ack failed");
                        self.downstream.on_error(error);
                    }
                });
            }
        }
    }

    fn schedule(self: Box<Self>) {
        let scheduler = Arc::clone(&self.scheduler);
        scheduler.trampoline(Box::new(move || self.run()));
    }

    fn complete(mut self: Box<Self>) {
        debug!(emitted = self.emitted, "source exhausted");
        self.downstream.on_complete();
    }
}
