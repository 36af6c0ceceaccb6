//! Deferred results with callback registration.
//!
//! A [`Deferred`] is a shared, read-only handle to a value that will be
//! settled exactly once, either with a value or with an [`Error`]. The write
//! side is a [`Promise`]. Handles can be inspected without blocking
//! ([`Deferred::peek`]), observed through callbacks
//! ([`Deferred::on_settled`]) or awaited as a [`Future`].
//!
//! # Callback execution
//!
//! Callbacks run exactly once, never before settlement:
//!
//! - inline on the thread that completes the promise, in registration order;
//! - inline on the registering thread when the handle is already settled.
//!
//! No lock is held while a callback runs, so callbacks may freely register
//! further callbacks or complete other promises.
//!
//! # Abandonment
//!
//! Dropping a [`Promise`] without completing it settles the handle with
//! [`ErrorKind::Abandoned`](crate::error::ErrorKind::Abandoned), so a
//! continuation waiting on it is never leaked silently.

use crate::error::Error;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// The outcome carried by a settled [`Deferred`].
pub type Settled<T> = Result<T, Error>;

type Callback<T> = Box<dyn FnOnce(Settled<T>) + Send>;

enum State<T> {
    Pending {
        callbacks: SmallVec<[Callback<T>; 2]>,
        wakers: SmallVec<[Waker; 1]>,
    },
    Settled(Settled<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone> Shared<T> {
    fn settle(&self, outcome: Settled<T>) {
        let (callbacks, wakers) = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending { callbacks, wakers } => (callbacks, wakers),
                first @ State::Settled(_) => {
                    *state = first;
                    return;
                }
            }
        };
        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            callback(outcome.clone());
        }
    }
}

/// Read side of a value settled at most once.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Creates an unsettled handle together with the promise that settles it.
    #[must_use]
    pub fn pending() -> (Promise<T>, Self) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending {
                callbacks: SmallVec::new(),
                wakers: SmallVec::new(),
            }),
        });
        let promise = Promise {
            shared: Some(Arc::clone(&shared)),
        };
        (promise, Self { shared })
    }

    /// Creates a handle already settled with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// Creates a handle already settled with `error`.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        Self::settled(Err(error))
    }

    /// Creates a handle already settled with `outcome`.
    #[must_use]
    pub fn settled(outcome: Settled<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Settled(outcome)),
            }),
        }
    }

    /// Returns the outcome if the handle is settled. Never blocks on settlement.
    #[must_use]
    pub fn peek(&self) -> Option<Settled<T>> {
        match &*self.shared.state.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Returns true once the handle carries an outcome.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Settled(_))
    }

    /// Registers `callback` to run once with the outcome.
    ///
    /// Runs immediately, on the calling thread, if the handle is settled.
    pub fn on_settled<F>(&self, callback: F)
    where
        F: FnOnce(Settled<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Settled(outcome) => outcome.clone(),
                State::Pending { callbacks, .. } => {
                    callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(outcome);
    }

    /// Returns true if both handles share the same underlying cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone + Send + 'static> Future for Deferred<T> {
    type Output = Settled<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Settled(outcome) => Poll::Ready(outcome.clone()),
            State::Pending { wakers, .. } => {
                // One entry per awaiting task; clones of a handle may be
                // awaited from several tasks at once.
                if !wakers.iter().any(|known| known.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.shared.state.lock() {
            State::Settled(outcome) => f.debug_tuple("Deferred").field(outcome).finish(),
            State::Pending { callbacks, .. } => f
                .debug_struct("Deferred")
                .field("pending_callbacks", &callbacks.len())
                .finish(),
        }
    }
}

/// Write side of a [`Deferred`]. Completing consumes the promise.
pub struct Promise<T: Clone> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Clone> Promise<T> {
    /// Settles the paired handle with `outcome` and runs its callbacks.
    pub fn complete(mut self, outcome: Settled<T>) {
        if let Some(shared) = self.shared.take() {
            shared.settle(outcome);
        }
    }

    /// Settles the paired handle with a value.
    pub fn success(self, value: T) {
        self.complete(Ok(value));
    }

    /// Settles the paired handle with an error.
    pub fn failure(self, error: Error) {
        self.complete(Err(error));
    }
}

impl<T: Clone> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Err(Error::abandoned()));
        }
    }
}

impl<T: Clone> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.shared.is_none())
            .finish()
    }
}
