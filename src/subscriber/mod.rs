//! The consumer side of a stream.
//!
//! A [`Subscriber`] receives events in the order
//! `on_next* (on_complete | on_error)?`:
//!
//! - any number of values, each answered with an [`Ack`];
//! - at most one terminal event, after which nothing else arrives;
//! - no `on_next` after an [`Ack`] resolved to `Stop`.
//!
//! Producers written against this crate are trusted to respect the grammar
//! only when they attach through [`SafeSubscriber`], which enforces it
//! regardless of how the wrapped consumer behaves.

pub mod safe;

pub use safe::SafeSubscriber;

use crate::error::Error;
use crate::runtime::SchedulerRef;
use crate::types::Ack;
use std::fmt;

/// A consumer of values of type `T`.
pub trait Subscriber<T>: Send {
    /// Delivers one value and returns the consumer's acknowledgment.
    fn on_next(&mut self, value: T) -> Ack;

    /// Delivers the terminal failure.
    fn on_error(&mut self, error: Error);

    /// Delivers the terminal completion.
    fn on_complete(&mut self);

    /// The scheduling capability producers use on this subscriber's behalf.
    fn scheduler(&self) -> &SchedulerRef;
}

/// An owned, type-erased subscriber.
pub type BoxSubscriber<T> = Box<dyn Subscriber<T>>;

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_next(&mut self, value: T) -> Ack {
        (**self).on_next(value)
    }

    fn on_error(&mut self, error: Error) {
        (**self).on_error(error);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }

    fn scheduler(&self) -> &SchedulerRef {
        (**self).scheduler()
    }
}

type NextFn<T> = Box<dyn FnMut(T) -> Ack + Send>;
type ErrorFn = Box<dyn FnOnce(Error) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// A subscriber assembled from optional closures.
///
/// A missing `next` handler answers every value with `Continue`; missing
/// terminal handlers ignore the event.
///
/// ```
/// use ackstream::runtime::LabScheduler;
/// use ackstream::subscriber::{FnSubscriber, Subscriber};
/// use ackstream::types::Ack;
/// use std::sync::Arc;
///
/// let mut sub = FnSubscriber::new(Arc::new(LabScheduler::new()))
///     .with_next(|n: u32| if n < 3 { Ack::Continue } else { Ack::Stop });
/// assert_eq!(sub.on_next(1), Ack::Continue);
/// assert_eq!(sub.on_next(3), Ack::Stop);
/// ```
pub struct FnSubscriber<T> {
    next: Option<NextFn<T>>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
    scheduler: SchedulerRef,
}

impl<T> FnSubscriber<T> {
    /// Creates a subscriber with no handlers.
    #[must_use]
    pub fn new(scheduler: SchedulerRef) -> Self {
        Self {
            next: None,
            error: None,
            complete: None,
            scheduler,
        }
    }

    /// Sets the value handler.
    #[must_use]
    pub fn with_next(mut self, next: impl FnMut(T) -> Ack + Send + 'static) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// Sets the failure handler.
    #[must_use]
    pub fn with_error(mut self, error: impl FnOnce(Error) + Send + 'static) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Sets the completion handler.
    #[must_use]
    pub fn with_complete(mut self, complete: impl FnOnce() + Send + 'static) -> Self {
        self.complete = Some(Box::new(complete));
        self
    }
}

impl<T> Subscriber<T> for FnSubscriber<T> {
    fn on_next(&mut self, value: T) -> Ack {
        match self.next.as_mut() {
            Some(next) => next(value),
            None => Ack::Continue,
        }
    }

    fn on_error(&mut self, error: Error) {
        if let Some(handler) = self.error.take() {
            handler(error);
        }
    }

    fn on_complete(&mut self) {
        if let Some(handler) = self.complete.take() {
            handler();
        }
    }

    fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }
}

impl<T> fmt::Debug for FnSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSubscriber")
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .field("scheduler", &self.scheduler.name())
            .finish()
    }
}
