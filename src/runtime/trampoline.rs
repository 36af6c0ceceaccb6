//! Thread-local trampoline scheduler.
//!
//! The first [`trampoline`](Scheduler::trampoline) call on a thread becomes
//! the *drainer*: it runs its task, then keeps popping tasks from the
//! thread's run queue until it is empty. Calls made while a drain is in
//! progress (typically from inside a running task) only enqueue and return.
//! A chain of N continuations therefore runs in a loop at constant stack
//! depth instead of N nested frames.
//!
//! Each queued task remembers the scheduler that enqueued it, so panic
//! isolation and failure reporting follow that scheduler's configuration
//! even when a different instance is draining the queue.

use super::{Scheduler, Task};
use crate::config::SchedulerConfig;
use crate::error::Error;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Callback invoked with every reported failure, after it is logged.
pub type FailureSink = Arc<dyn Fn(&Error) + Send + Sync>;

thread_local! {
    static RUN_QUEUE: RefCell<Option<VecDeque<Task>>> = const { RefCell::new(None) };
}

/// Resets the thread's queue when the drainer exits, including by unwinding.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        RUN_QUEUE.with(|queue| queue.borrow_mut().take());
    }
}

struct Inner {
    config: SchedulerConfig,
    sink: Option<FailureSink>,
}

impl Inner {
    fn run(&self, task: Task) {
        if !self.config.catch_panics {
            task();
            return;
        }
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            self.report(Error::from_panic(payload).with_context("trampolined task"));
        }
    }

    fn report(&self, failure: Error) {
        self.config.failure_level.report("trampoline", &failure);
        if let Some(sink) = &self.sink {
            sink(&failure);
        }
    }
}

/// Stack-safe scheduler backed by a per-thread run queue.
#[derive(Clone)]
pub struct TrampolineScheduler {
    inner: Arc<Inner>,
}

impl TrampolineScheduler {
    /// Creates a scheduler with `config`.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner { config, sink: None }),
        }
    }

    /// Creates a scheduler that also forwards reported failures to `sink`.
    #[must_use]
    pub fn with_sink(config: SchedulerConfig, sink: FailureSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sink: Some(sink),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Returns true while the current thread is draining a run queue.
    #[must_use]
    pub fn is_draining() -> bool {
        RUN_QUEUE.with(|queue| queue.borrow().is_some())
    }
}

impl Default for TrampolineScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler for TrampolineScheduler {
    fn trampoline(&self, task: Task) {
        let job: Task = {
            let inner = Arc::clone(&self.inner);
            Box::new(move || inner.run(task))
        };
        let first = RUN_QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            if let Some(pending) = queue.as_mut() {
                pending.push_back(job);
                None
            } else {
                *queue = Some(VecDeque::with_capacity(self.inner.config.queue_capacity));
                Some(job)
            }
        });
        let Some(first) = first else {
            return;
        };

        let _guard = DrainGuard;
        first();
        while let Some(next) =
            RUN_QUEUE.with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front))
        {
            next();
        }
    }

    fn report_failure(&self, failure: Error) {
        self.inner.report(failure);
    }

    fn name(&self) -> &'static str {
        "trampoline"
    }
}

impl fmt::Debug for TrampolineScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrampolineScheduler")
            .field("config", &self.inner.config)
            .field("has_sink", &self.inner.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn collecting() -> (Arc<Mutex<Vec<Error>>>, TrampolineScheduler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let scheduler = TrampolineScheduler::with_sink(
            SchedulerConfig::default(),
            Arc::new(move |failure: &Error| sink_seen.lock().push(failure.clone())),
        );
        (seen, scheduler)
    }

    #[test]
    fn nested_tasks_run_after_the_current_one() {
        init_test("nested_tasks_run_after_the_current_one");
        let scheduler = TrampolineScheduler::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (s, o) = (scheduler.clone(), Arc::clone(&order));
        scheduler.trampoline(Box::new(move || {
            o.lock().push("outer start");
            let inner = Arc::clone(&o);
            s.trampoline(Box::new(move || inner.lock().push("inner")));
            o.lock().push("outer end");
        }));
        let order = order.lock().clone();
        crate::assert_with_log!(
            order == vec!["outer start", "outer end", "inner"],
            "trampoline order",
            "[outer start, outer end, inner]",
            order
        );
        assert!(!TrampolineScheduler::is_draining());
        crate::test_complete!("nested_tasks_run_after_the_current_one");
    }

    fn chain(scheduler: TrampolineScheduler, remaining: usize, hits: Arc<AtomicUsize>) {
        hits.fetch_add(1, Ordering::Relaxed);
        if remaining > 0 {
            let next = scheduler.clone();
            scheduler.trampoline(Box::new(move || chain(next, remaining - 1, hits)));
        }
    }

    #[test]
    fn long_chains_run_in_constant_stack() {
        init_test("long_chains_run_in_constant_stack");
        let scheduler = TrampolineScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let (s, h) = (scheduler.clone(), Arc::clone(&hits));
        scheduler.trampoline(Box::new(move || chain(s, 1_000_000, h)));
        let count = hits.load(Ordering::Relaxed);
        crate::assert_with_log!(count == 1_000_001, "chain length", 1_000_001, count);
        crate::test_complete!("long_chains_run_in_constant_stack");
    }

    #[test]
    fn panicking_task_is_reported_and_drain_continues() {
        init_test("panicking_task_is_reported_and_drain_continues");
        let (seen, scheduler) = collecting();
        let ran_after = Arc::new(AtomicUsize::new(0));
        let (s, r) = (scheduler.clone(), Arc::clone(&ran_after));
        scheduler.trampoline(Box::new(move || {
            s.trampoline(Box::new(|| panic!("task exploded")));
            s.trampoline(Box::new(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        assert_eq!(ran_after.load(Ordering::SeqCst), 1, "queue kept draining");
        let failures = seen.lock().clone();
        crate::assert_with_log!(failures.len() == 1, "one failure", 1, failures.len());
        assert!(failures[0].is_panic());
        assert_eq!(failures[0].message(), Some("task exploded"));
        crate::test_complete!("panicking_task_is_reported_and_drain_continues");
    }

    #[test]
    fn uncaught_panic_resets_the_queue() {
        init_test("uncaught_panic_resets_the_queue");
        let scheduler =
            TrampolineScheduler::new(SchedulerConfig::default().with_catch_panics(false));
        let s = scheduler.clone();
        let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
            s.trampoline(Box::new(|| panic!("escapes")));
        }));
        assert!(result.is_err());
        assert!(!TrampolineScheduler::is_draining(), "guard cleared the queue");

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        scheduler.trampoline(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1, "scheduler usable afterwards");
        crate::test_complete!("uncaught_panic_resets_the_queue");
    }

    #[test]
    fn report_failure_reaches_the_sink() {
        init_test("report_failure_reaches_the_sink");
        let (seen, scheduler) = collecting();
        scheduler.report_failure(Error::user("escaped"));
        let failures = seen.lock().clone();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message(), Some("escaped"));
        assert!(format!("{scheduler:?}").contains("has_sink: true"));
        crate::test_complete!("report_failure_reaches_the_sink");
    }
}
