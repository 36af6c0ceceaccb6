//! Producers that emit the result of evaluating a function.
//!
//! [`eval_always`] evaluates on every subscription; [`eval_once`] evaluates
//! on the first subscription and replays the recorded value, or the
//! recorded error, to every later one. A panicking function counts as a
//! failed evaluation.
//!
//! The value is emitted and completion follows without waiting for the ack;
//! a [`SafeSubscriber`](crate::subscriber::SafeSubscriber) holds completion
//! back until the ack resolves. A subscriber that panics while being
//! signalled cannot be told about it through the grammar, so the panic and
//! any evaluation error it was handling go to its scheduler's failure sink.

use super::{Observable, Source};
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::subscriber::BoxSubscriber;
use crate::tracing_compat::debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

fn evaluate<T, F>(f: &F) -> Result<T, Error>
where
    F: Fn() -> Result<T, Error>,
{
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::from_panic(payload).with_context("eval")))
}

fn signal<T>(subscriber: &mut BoxSubscriber<T>, result: Result<T, Error>) {
    let original = result.as_ref().err().cloned();
    let outcome = catch_unwind(AssertUnwindSafe(|| match result {
        Ok(value) => {
            let _ = subscriber.on_next(value);
            subscriber.on_complete();
        }
        Err(error) => subscriber.on_error(error),
    }));
    if let Err(payload) = outcome {
        let scheduler = subscriber.scheduler();
        scheduler.report_failure(Error::from_panic(payload).with_context("signalling eval result"));
        if let Some(error) = original {
            scheduler.report_failure(error);
        }
    }
}

struct EvalAlways<F> {
    f: F,
}

impl<T, F> Source<T> for EvalAlways<F>
where
    F: Fn() -> Result<T, Error> + Send + Sync,
{
    fn attach(&self, mut subscriber: BoxSubscriber<T>) -> CancellationToken {
        let result = evaluate(&self.f);
        signal(&mut subscriber, result);
        CancellationToken::inert()
    }
}

struct EvalOnce<T, F> {
    f: F,
    memo: OnceLock<Result<T, Error>>,
}

impl<T, F> Source<T> for EvalOnce<T, F>
where
    T: Clone + Send + Sync,
    F: Fn() -> Result<T, Error> + Send + Sync,
{
    fn attach(&self, mut subscriber: BoxSubscriber<T>) -> CancellationToken {
        let result = self
            .memo
            .get_or_init(|| {
                let result = evaluate(&self.f);
                debug!(ok = result.is_ok(), "eval_once memoized");
                result
            })
            .clone();
        signal(&mut subscriber, result);
        CancellationToken::inert()
    }
}

/// Emits the result of `f`, evaluated anew for every subscription.
///
/// `Ok(v)` emits `v` and completes; `Err(e)` fails with `e`.
#[must_use]
pub fn eval_always<T, F>(f: F) -> Observable<T>
where
    T: 'static,
    F: Fn() -> Result<T, Error> + Send + Sync + 'static,
{
    Observable::new(EvalAlways { f })
}

/// Emits the result of `f`, evaluated at most once across all subscriptions.
///
/// ```
/// use ackstream::runtime::LabScheduler;
/// use ackstream::stream::eval_once;
/// use ackstream::subscriber::FnSubscriber;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&calls);
/// let answer = eval_once(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(42)
/// });
/// for _ in 0..3 {
///     answer.subscribe_with(FnSubscriber::new(Arc::new(LabScheduler::new())));
/// }
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[must_use]
pub fn eval_once<T, F>(f: F) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Result<T, Error> + Send + Sync + 'static,
{
    Observable::new(EvalOnce {
        f,
        memo: OnceLock::new(),
    })
}
