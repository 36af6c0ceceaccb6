//! Producers of back-pressured event streams.
//!
//! Every producer implements [`Source`], which knows only how to attach a
//! subscriber. [`Observable`] wraps a source and layers the shared surface on
//! top of it:
//!
//! - [`Observable::subscribe_with`] attaches through a [`SafeSubscriber`];
//! - [`Observable::subscribe`] builds the subscriber from closures;
//! - [`Observable::unsafe_subscribe`] attaches the subscriber as is;
//! - [`Observable::pipe`] composes an [`Operator`].
//!
//! # Builders
//!
//! | Builder                        | Emits                                      |
//! |--------------------------------|--------------------------------------------|
//! | [`from_vec`], [`from_iter`], [`items!`](crate::items) | each element, back-pressured |
//! | [`count`]                      | `0, 1, 2, ...` until stopped               |
//! | [`pure`]                       | one value, then completes                  |
//! | [`eval_always`]                | a value computed per subscription          |
//! | [`eval_once`]                  | a value computed once and replayed         |
//! | [`empty`]                      | completes immediately                      |
//! | [`never`]                      | nothing, ever                              |

pub mod count;
pub mod delivery;
pub mod empty;
pub mod eval;
pub mod iter;
pub mod operator;
pub mod pure;

pub use count::{count, count_default};
pub use delivery::Cursor;
pub use empty::{empty, never};
pub use eval::{eval_always, eval_once};
pub use iter::{from_iter, from_vec, from_vec_default};
pub use operator::{Operator, compose, map};
pub use pure::pure;

use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::runtime::{self, SchedulerRef};
use crate::subscriber::{BoxSubscriber, FnSubscriber, SafeSubscriber, Subscriber};
use crate::types::Ack;
use std::fmt;
use std::sync::Arc;

/// The producer-specific half of an [`Observable`].
pub trait Source<T>: Send + Sync {
    /// Starts delivering to `subscriber` and returns the subscription's
    /// cancellation token.
    ///
    /// The subscriber is used as given; callers wanting grammar enforcement
    /// wrap it in a [`SafeSubscriber`] first.
    fn attach(&self, subscriber: BoxSubscriber<T>) -> CancellationToken;
}

enum SourceRef<T: 'static> {
    Shared(Arc<dyn Source<T>>),
    Static(&'static dyn Source<T>),
}

impl<T: 'static> Clone for SourceRef<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Shared(source) => Self::Shared(Arc::clone(source)),
            Self::Static(source) => Self::Static(*source),
        }
    }
}

/// A stream of `T` values that can be subscribed to any number of times.
pub struct Observable<T: 'static> {
    source: SourceRef<T>,
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Wraps a producer.
    #[must_use]
    pub fn new(source: impl Source<T> + 'static) -> Self {
        Self::from_shared(Arc::new(source))
    }

    /// Wraps an already shared producer.
    #[must_use]
    pub fn from_shared(source: Arc<dyn Source<T>>) -> Self {
        Self {
            source: SourceRef::Shared(source),
        }
    }

    /// Wraps a process-wide producer instance.
    #[must_use]
    pub const fn from_static(source: &'static dyn Source<T>) -> Self {
        Self {
            source: SourceRef::Static(source),
        }
    }

    /// Attaches `subscriber` without grammar enforcement.
    pub fn unsafe_subscribe(&self, subscriber: BoxSubscriber<T>) -> CancellationToken {
        match &self.source {
            SourceRef::Shared(source) => source.attach(subscriber),
            SourceRef::Static(source) => source.attach(subscriber),
        }
    }

    /// Attaches `subscriber` wrapped in a [`SafeSubscriber`].
    pub fn subscribe_with(&self, subscriber: impl Subscriber<T> + 'static) -> CancellationToken {
        self.unsafe_subscribe(Box::new(SafeSubscriber::new(Box::new(subscriber))))
    }

    /// Subscribes with closures, on the process-wide default scheduler.
    pub fn subscribe<N, E, C>(&self, next: N, error: E, complete: C) -> CancellationToken
    where
        N: FnMut(T) -> Ack + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.subscribe_on(runtime::global(), next, error, complete)
    }

    /// Subscribes with closures, using `scheduler` for failure reporting.
    pub fn subscribe_on<N, E, C>(
        &self,
        scheduler: SchedulerRef,
        next: N,
        error: E,
        complete: C,
    ) -> CancellationToken
    where
        N: FnMut(T) -> Ack + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.subscribe_with(
            FnSubscriber::new(scheduler)
                .with_next(next)
                .with_error(error)
                .with_complete(complete),
        )
    }

    /// Returns a producer whose subscribers are first transformed by
    /// `operator`, then attached to this producer.
    #[must_use]
    pub fn pipe<O: 'static>(&self, operator: Operator<T, O>) -> Observable<O> {
        Observable::new(Piped {
            upstream: self.clone(),
            operator,
        })
    }
}

impl<T: 'static> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            SourceRef::Shared(_) => "shared",
            SourceRef::Static(_) => "static",
        };
        f.debug_struct("Observable").field("source", &kind).finish()
    }
}

struct Piped<I: 'static, O: 'static> {
    upstream: Observable<I>,
    operator: Operator<I, O>,
}

impl<I: 'static, O: 'static> Source<O> for Piped<I, O> {
    fn attach(&self, subscriber: BoxSubscriber<O>) -> CancellationToken {
        self.upstream.unsafe_subscribe((self.operator)(subscriber))
    }
}
