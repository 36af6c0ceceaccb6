//! Grammar enforcement around an arbitrary subscriber.
//!
//! [`SafeSubscriber`] guarantees, from the producer's point of view, that
//! the wrapped consumer sees `on_next* (on_complete | on_error)?` no matter
//! how the consumer itself behaves:
//!
//! - once the consumer answers `Stop`, or a terminal event was forwarded,
//!   further values are refused with `Stop` without reaching the consumer;
//! - a panic from the consumer's `on_next` becomes a single `on_error` and
//!   the producer is answered with `Stop`;
//! - a deferred ack that settles with a failure becomes a single `on_error`
//!   and is reported upstream as `Stop`;
//! - terminal events wait until the last ack resolves to `Continue`, so a
//!   producer signalling completion right after its final value cannot make
//!   completion overtake that value's acknowledgment;
//! - panics from the consumer's terminal handlers go to the scheduler's
//!   failure sink, since the grammar allows no second terminal event.
//!
//! The state is shared with continuations registered on deferred acks. The
//! lock is never held while a continuation is registered or a promise is
//! completed, so callbacks that run inline cannot deadlock on it.
//!
//! The lock *is* held while the consumer's own handlers run. Re-entering
//! [`Subscriber::on_next`] or a terminal handler of the same wrapper from
//! inside one of them deadlocks; [`SafeSubscriber::is_done`] and `Debug`
//! stay safe to call from anywhere.

use super::{BoxSubscriber, Subscriber};
use crate::deferred::{Deferred, Settled};
use crate::error::Error;
use crate::runtime::SchedulerRef;
use crate::tracing_compat::{debug, trace};
use crate::types::{Ack, SyncAck};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct State<T> {
    downstream: BoxSubscriber<T>,
    // Only written under the state lock; readable without it.
    done: Arc<AtomicBool>,
    ack: Ack,
}

impl<T> State<T> {
    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    fn signal_error(&mut self, error: Error) -> Option<Error> {
        if self.is_done() {
            return None;
        }
        self.mark_done();
        self.ack = Ack::Stop;
        catch_unwind(AssertUnwindSafe(|| self.downstream.on_error(error)))
            .err()
            .map(|payload| Error::from_panic(payload).with_context("on_error"))
    }

    fn signal_complete(&mut self) -> Option<Error> {
        if self.is_done() {
            return None;
        }
        self.mark_done();
        catch_unwind(AssertUnwindSafe(|| self.downstream.on_complete()))
            .err()
            .map(|payload| Error::from_panic(payload).with_context("on_complete"))
    }

    fn resolve(&mut self, outcome: Settled<SyncAck>) -> (SyncAck, Option<Error>) {
        match outcome {
            Ok(SyncAck::Continue) if !self.is_done() => {
                self.ack = Ack::Continue;
                (SyncAck::Continue, None)
            }
            Ok(_) => {
                self.mark_done();
                self.ack = Ack::Stop;
                (SyncAck::Stop, None)
            }
            Err(error) => {
                debug!(%error, "deferred ack failed");
                (SyncAck::Stop, self.signal_error(error))
            }
        }
    }
}

/// Wraps a subscriber so that the event grammar always holds.
pub struct SafeSubscriber<T> {
    state: Arc<Mutex<State<T>>>,
    done: Arc<AtomicBool>,
    scheduler: SchedulerRef,
}

impl<T: 'static> SafeSubscriber<T> {
    /// Wraps `downstream`, using its scheduler for failure reporting.
    #[must_use]
    pub fn new(downstream: BoxSubscriber<T>) -> Self {
        let scheduler = Arc::clone(downstream.scheduler());
        Self::with_scheduler(downstream, scheduler)
    }

    /// Wraps `downstream`, reporting failures to `scheduler`.
    #[must_use]
    pub fn with_scheduler(downstream: BoxSubscriber<T>, scheduler: SchedulerRef) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        Self {
            state: Arc::new(Mutex::new(State {
                downstream,
                done: Arc::clone(&done),
                ack: Ack::Continue,
            })),
            done,
            scheduler,
        }
    }

    /// Returns true once no further event will reach the wrapped subscriber.
    ///
    /// Lock-free, so the wrapped consumer may call it from its own handlers.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn report(&self, failure: Option<Error>) {
        if let Some(failure) = failure {
            self.scheduler.report_failure(failure);
        }
    }

    fn after_last_ack<F>(&self, signal: F)
    where
        F: FnOnce(&mut State<T>) -> Option<Error> + Send + 'static,
    {
        let last = self.state.lock().ack.clone();
        let state = Arc::clone(&self.state);
        let scheduler = Arc::clone(&self.scheduler);
        last.on_continue(move || {
            let failure = signal(&mut *state.lock());
            if let Some(failure) = failure {
                scheduler.report_failure(failure);
            }
        });
    }
}

impl<T: 'static> Subscriber<T> for SafeSubscriber<T> {
    fn on_next(&mut self, value: T) -> Ack {
        if self.is_done() {
            return Ack::Stop;
        }
        let mut state = self.state.lock();
        if state.is_done() {
            return Ack::Stop;
        }

        let ack = match catch_unwind(AssertUnwindSafe(|| state.downstream.on_next(value))) {
            Ok(ack) => ack,
            Err(payload) => {
                let error = Error::from_panic(payload).with_context("on_next");
                debug!(%error, "subscriber panicked in on_next");
                let failure = state.signal_error(error);
                drop(state);
                self.report(failure);
                return Ack::Stop;
            }
        };

        match ack {
            Ack::Continue => {
                state.ack = Ack::Continue;
                Ack::Continue
            }
            Ack::Stop => {
                state.mark_done();
                state.ack = Ack::Stop;
                Ack::Stop
            }
            Ack::Async(deferred) => {
                if let Some(outcome) = deferred.peek() {
                    let (resolved, failure) = state.resolve(outcome);
                    drop(state);
                    self.report(failure);
                    return resolved.into();
                }

                let (promise, flattened) = Deferred::pending();
                state.ack = Ack::Async(flattened.clone());
                drop(state);
                trace!("awaiting deferred ack");

                let shared = Arc::clone(&self.state);
                let scheduler = Arc::clone(&self.scheduler);
                deferred.on_settled(move |outcome| {
                    let (resolved, failure) = shared.lock().resolve(outcome);
                    if let Some(failure) = failure {
                        scheduler.report_failure(failure);
                    }
                    promise.success(resolved);
                });
                Ack::Async(flattened)
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        self.after_last_ack(move |state| state.signal_error(error));
    }

    fn on_complete(&mut self) {
        self.after_last_ack(State::signal_complete);
    }

    fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }
}

impl<T> fmt::Debug for SafeSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("SafeSubscriber");
        out.field("done", &self.done.load(Ordering::Acquire));
        // The lock is held for as long as a consumer handler runs.
        match self.state.try_lock() {
            Some(state) => out.field("ack", &state.ack),
            None => out.field("ack", &format_args!("<locked>")),
        };
        out.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::LabScheduler;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    struct Counts {
        next: usize,
        error: usize,
        complete: usize,
        errors: Vec<String>,
    }

    /// Answers each value with the value itself; optionally panics.
    struct Recorder {
        counts: Arc<Mutex<Counts>>,
        panic_on_next: bool,
        panic_on_error: bool,
        panic_on_complete: bool,
        scheduler: SchedulerRef,
    }

    impl Subscriber<Ack> for Recorder {
        fn on_next(&mut self, value: Ack) -> Ack {
            self.counts.lock().next += 1;
            assert!(!self.panic_on_next, "something went wrong on_next");
            value
        }

        fn on_error(&mut self, error: Error) {
            {
                let mut counts = self.counts.lock();
                counts.error += 1;
                counts.errors.push(error.to_string());
            }
            assert!(!self.panic_on_error, "something went wrong on_error");
        }

        fn on_complete(&mut self) {
            self.counts.lock().complete += 1;
            assert!(!self.panic_on_complete, "something went wrong on_complete");
        }

        fn scheduler(&self) -> &SchedulerRef {
            &self.scheduler
        }
    }

    struct Harness {
        lab: Arc<LabScheduler>,
        counts: Arc<Mutex<Counts>>,
        safe: SafeSubscriber<Ack>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_panics(false, false, false)
        }

        fn with_panics(next: bool, error: bool, complete: bool) -> Self {
            let lab = Arc::new(LabScheduler::new());
            let counts = Arc::new(Mutex::new(Counts::default()));
            let recorder = Recorder {
                counts: Arc::clone(&counts),
                panic_on_next: next,
                panic_on_error: error,
                panic_on_complete: complete,
                scheduler: Arc::clone(&lab) as SchedulerRef,
            };
            Self {
                lab,
                counts,
                safe: SafeSubscriber::new(Box::new(recorder)),
            }
        }

        fn counts(&self) -> Counts {
            self.counts.lock().clone()
        }
    }

    fn settled(ack: SyncAck) -> Ack {
        Ack::deferred(Deferred::resolved(ack))
    }

    #[test]
    fn refuses_values_after_stop() {
        init_test("refuses_values_after_stop");
        let mut h = Harness::new();
        assert_eq!(h.safe.on_next(Ack::Continue), Ack::Continue);
        assert_eq!(h.safe.on_next(Ack::Continue), Ack::Continue);
        assert_eq!(h.safe.on_next(Ack::Stop), Ack::Stop);
        assert_eq!(h.counts().next, 3);

        assert_eq!(h.safe.on_next(Ack::Continue), Ack::Stop);
        assert_eq!(h.safe.on_next(settled(SyncAck::Stop)), Ack::Stop);
        assert_eq!(h.safe.on_next(settled(SyncAck::Continue)), Ack::Stop);
        let next = h.counts().next;
        crate::assert_with_log!(next == 3, "downstream untouched after stop", 3, next);
        assert!(h.safe.is_done());
        crate::test_complete!("refuses_values_after_stop");
    }

    #[test]
    fn refuses_values_after_terminal_events() {
        init_test("refuses_values_after_terminal_events");
        let mut completed = Harness::new();
        completed.safe.on_next(Ack::Continue);
        completed.safe.on_complete();
        assert_eq!(completed.counts().complete, 1);
        assert_eq!(completed.safe.on_next(Ack::Continue), Ack::Stop);
        assert_eq!(completed.safe.on_next(settled(SyncAck::Continue)), Ack::Stop);
        assert_eq!(completed.counts().next, 1);

        let mut failed = Harness::new();
        failed.safe.on_next(Ack::Continue);
        failed.safe.on_error(Error::user("something went wrong"));
        assert_eq!(failed.counts().error, 1);
        assert_eq!(failed.safe.on_next(Ack::Stop), Ack::Stop);
        assert_eq!(failed.safe.on_next(settled(SyncAck::Stop)), Ack::Stop);
        assert_eq!(failed.counts().next, 1);
        crate::test_complete!("refuses_values_after_terminal_events");
    }

    #[test]
    fn terminal_events_are_delivered_at_most_once() {
        init_test("terminal_events_are_delivered_at_most_once");
        let mut h = Harness::new();
        h.safe.on_next(Ack::Continue);
        h.safe.on_complete();
        h.safe.on_complete();
        h.safe.on_error(Error::user("late"));
        let counts = h.counts();
        crate::assert_with_log!(
            counts.complete == 1 && counts.error == 0,
            "single completion",
            "complete=1 error=0",
            counts
        );

        let mut h = Harness::new();
        h.safe.on_error(Error::user("first"));
        h.safe.on_error(Error::user("second"));
        h.safe.on_complete();
        let counts = h.counts();
        assert_eq!((counts.error, counts.complete), (1, 0));
        assert!(counts.errors[0].contains("first"));
        crate::test_complete!("terminal_events_are_delivered_at_most_once");
    }

    #[test]
    fn stop_suppresses_terminal_events() {
        init_test("stop_suppresses_terminal_events");
        let mut h = Harness::new();
        h.safe.on_next(Ack::Continue);
        h.safe.on_next(Ack::Stop);
        h.safe.on_complete();
        h.safe.on_error(Error::user("ignored"));
        let counts = h.counts();
        crate::assert_with_log!(
            counts.complete == 0 && counts.error == 0,
            "no terminal after stop",
            "0/0",
            counts
        );
        crate::test_complete!("stop_suppresses_terminal_events");
    }

    #[test]
    fn panicking_on_next_becomes_on_error_and_stop() {
        init_test("panicking_on_next_becomes_on_error_and_stop");
        let mut h = Harness::with_panics(true, false, false);
        let ack = h.safe.on_next(Ack::Continue);
        crate::assert_with_log!(ack == Ack::Stop, "ack after panic", Ack::Stop, ack);
        let counts = h.counts();
        assert_eq!(counts.error, 1);
        assert!(counts.errors[0].contains("something went wrong on_next"));

        assert_eq!(h.safe.on_next(Ack::Continue), Ack::Stop);
        assert_eq!(h.counts().next, 1, "downstream not touched again");
        h.safe.on_complete();
        assert_eq!(h.counts().complete, 0);
        assert!(h.lab.failures().is_empty());
        crate::test_complete!("panicking_on_next_becomes_on_error_and_stop");
    }

    #[test]
    fn panicking_terminal_handlers_go_to_failure_sink() {
        init_test("panicking_terminal_handlers_go_to_failure_sink");
        let mut h = Harness::with_panics(false, true, false);
        h.safe.on_error(Error::user("something went wrong"));
        let failures = h.lab.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), ErrorKind::Panicked);
        assert_eq!(failures[0].context(), Some("on_error"));

        let mut h = Harness::with_panics(false, false, true);
        h.safe.on_complete();
        h.safe.on_complete();
        let failures = h.lab.failures();
        crate::assert_with_log!(failures.len() == 1, "one report", 1, failures.len());
        assert_eq!(failures[0].context(), Some("on_complete"));
        assert_eq!(h.counts().complete, 1);
        crate::test_complete!("panicking_terminal_handlers_go_to_failure_sink");
    }

    #[test]
    fn settled_deferred_acks_are_flattened() {
        init_test("settled_deferred_acks_are_flattened");
        let mut h = Harness::new();
        let ack = h.safe.on_next(settled(SyncAck::Continue));
        crate::assert_with_log!(ack == Ack::Continue, "flattened", Ack::Continue, ack);

        let ack = h.safe.on_next(Ack::deferred(Deferred::failed(Error::user("ack failed"))));
        assert_eq!(ack, Ack::Stop);
        let counts = h.counts();
        assert_eq!(counts.error, 1);
        assert!(counts.errors[0].contains("ack failed"));
        crate::test_complete!("settled_deferred_acks_are_flattened");
    }

    #[test]
    fn completion_waits_for_pending_continue() {
        init_test("completion_waits_for_pending_continue");
        let mut h = Harness::new();
        let (promise, pending) = Deferred::pending();
        let upstream = h.safe.on_next(Ack::deferred(pending));
        let Ack::Async(flattened) = upstream else {
            panic!("expected a pending ack, got {upstream:?}");
        };
        h.safe.on_complete();
        assert_eq!(h.counts().complete, 0, "completion must not overtake the ack");

        promise.success(SyncAck::Continue);
        let counts = h.counts();
        crate::assert_with_log!(counts.complete == 1, "completed after ack", 1, counts.complete);
        assert_eq!(flattened.peek().map(Result::ok), Some(Some(SyncAck::Continue)));
        crate::test_complete!("completion_waits_for_pending_continue");
    }

    #[test]
    fn pending_stop_cancels_completion() {
        init_test("pending_stop_cancels_completion");
        let mut h = Harness::new();
        let (promise, pending) = Deferred::pending();
        let _ = h.safe.on_next(Ack::deferred(pending));
        h.safe.on_complete();
        promise.success(SyncAck::Stop);
        assert_eq!(h.counts().complete, 0);
        assert!(h.safe.is_done());
        assert_eq!(h.safe.on_next(Ack::Continue), Ack::Stop);
        crate::test_complete!("pending_stop_cancels_completion");
    }

    #[test]
    fn pending_failure_during_completion_yields_single_error() {
        init_test("pending_failure_during_completion_yields_single_error");
        let mut h = Harness::new();
        let (promise, pending) = Deferred::pending();
        let upstream = h.safe.on_next(Ack::deferred(pending));
        h.safe.on_complete();
        h.safe.on_error(Error::producer("upstream also failed"));
        promise.failure(Error::user("ack failed"));

        let counts = h.counts();
        crate::assert_with_log!(
            counts.error == 1 && counts.complete == 0,
            "exactly one terminal event",
            "error=1 complete=0",
            counts
        );
        assert!(counts.errors[0].contains("ack failed"));
        let Ack::Async(flattened) = upstream else {
            panic!("expected a pending ack");
        };
        assert_eq!(flattened.peek().map(Result::ok), Some(Some(SyncAck::Stop)));
        assert!(h.lab.failures().is_empty());
        crate::test_complete!("pending_failure_during_completion_yields_single_error");
    }

    #[test]
    fn deferred_ack_settled_from_another_thread() {
        init_test("deferred_ack_settled_from_another_thread");
        let mut h = Harness::new();
        let (promise, pending) = Deferred::pending();
        let upstream = h.safe.on_next(Ack::deferred(pending));
        h.safe.on_complete();
        std::thread::spawn(move || promise.success(SyncAck::Continue))
            .join()
            .expect("settling thread");
        assert_eq!(h.counts().complete, 1);
        assert!(matches!(upstream, Ack::Async(_)));
        assert!(format!("{:?}", h.safe).contains("done: true"));
        crate::test_complete!("deferred_ack_settled_from_another_thread");
    }

    /// Looks at its own wrapper from inside `on_next`.
    struct Inspector {
        wrapper: Arc<Mutex<Option<SafeSubscriber<Ack>>>>,
        seen: Arc<Mutex<Vec<(bool, String)>>>,
        scheduler: SchedulerRef,
    }

    impl Subscriber<Ack> for Inspector {
        fn on_next(&mut self, value: Ack) -> Ack {
            if let Some(wrapper) = self.wrapper.lock().as_ref() {
                let view = (wrapper.is_done(), format!("{wrapper:?}"));
                self.seen.lock().push(view);
            }
            value
        }

        fn on_error(&mut self, _error: Error) {}

        fn on_complete(&mut self) {}

        fn scheduler(&self) -> &SchedulerRef {
            &self.scheduler
        }
    }

    #[test]
    fn consumer_can_inspect_its_wrapper_while_handling_a_value() {
        init_test("consumer_can_inspect_its_wrapper_while_handling_a_value");
        let lab = Arc::new(LabScheduler::new());
        let wrapper = Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut safe = SafeSubscriber::new(Box::new(Inspector {
            wrapper: Arc::clone(&wrapper),
            seen: Arc::clone(&seen),
            scheduler: Arc::clone(&lab) as SchedulerRef,
        }));
        *wrapper.lock() = Some(SafeSubscriber {
            state: Arc::clone(&safe.state),
            done: Arc::clone(&safe.done),
            scheduler: Arc::clone(&safe.scheduler),
        });

        assert_eq!(safe.on_next(Ack::Continue), Ack::Continue);
        assert_eq!(safe.on_next(Ack::Stop), Ack::Stop);

        let seen = seen.lock().clone();
        crate::assert_with_log!(seen.len() == 2, "handler saw its wrapper", 2, seen.len());
        assert!(seen.iter().all(|(done, _)| !done), "not done mid-handler: {seen:?}");
        assert!(
            seen.iter().all(|(_, debug)| debug.contains("<locked>")),
            "debug output while locked: {seen:?}"
        );
        assert!(safe.is_done());
        let debug = format!("{safe:?}");
        crate::assert_with_log!(
            debug.contains("ack: Stop"),
            "debug after handler",
            "ack: Stop",
            debug
        );
        wrapper.lock().take();
        crate::test_complete!("consumer_can_inspect_its_wrapper_while_handling_a_value");
    }
}
