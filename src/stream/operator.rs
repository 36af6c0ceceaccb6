//! Subscriber-transforming operators.
//!
//! An [`Operator<I, O>`] turns a downstream subscriber of `O` into an
//! upstream-facing subscriber of `I`. [`Observable::pipe`] applies it on
//! every attach, so composition is purely structural: no buffering and no
//! extra concurrency.
//!
//! Piping through `f` then `g` is the same as piping through
//! [`compose(f, g)`](compose).
//!
//! [`Observable::pipe`]: super::Observable::pipe

use crate::error::Error;
use crate::runtime::SchedulerRef;
use crate::subscriber::{BoxSubscriber, Subscriber};
use crate::tracing_compat::debug;
use crate::types::Ack;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Maps a downstream subscriber of `O` to an upstream subscriber of `I`.
pub type Operator<I, O> = Arc<dyn Fn(BoxSubscriber<O>) -> BoxSubscriber<I> + Send + Sync>;

/// Returns the operator equivalent to applying `first`, then `second`.
#[must_use]
pub fn compose<A, B, C>(first: Operator<A, B>, second: Operator<B, C>) -> Operator<A, C>
where
    A: 'static,
    B: 'static,
    C: 'static,
{
    Arc::new(move |downstream: BoxSubscriber<C>| first(second(downstream)))
}

/// Transforms every value with `f`.
///
/// A panic in `f` fails the stream with a
/// [`Panicked`](crate::error::ErrorKind::Panicked) error and stops upstream.
#[must_use]
pub fn map<I, O, F>(f: F) -> Operator<I, O>
where
    I: 'static,
    O: 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |downstream: BoxSubscriber<O>| -> BoxSubscriber<I> {
        Box::new(Map {
            f: Arc::clone(&f),
            downstream,
            failed: false,
        })
    })
}

struct Map<F, O> {
    f: Arc<F>,
    downstream: BoxSubscriber<O>,
    failed: bool,
}

impl<I, O, F> Subscriber<I> for Map<F, O>
where
    F: Fn(I) -> O + Send + Sync,
{
    fn on_next(&mut self, value: I) -> Ack {
        if self.failed {
            return Ack::Stop;
        }
        match catch_unwind(AssertUnwindSafe(|| (self.f)(value))) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(payload) => {
                let error = Error::from_panic(payload).with_context("map");
                debug!(%error, "map function panicked");
                self.failed = true;
                self.downstream.on_error(error);
                Ack::Stop
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        if !self.failed {
            self.downstream.on_error(error);
        }
    }

    fn on_complete(&mut self) {
        if !self.failed {
            self.downstream.on_complete();
        }
    }

    fn scheduler(&self) -> &SchedulerRef {
        self.downstream.scheduler()
    }
}
