//! Deterministic, manually stepped scheduler for tests.
//!
//! Trampolined tasks are queued and only run when the test calls
//! [`LabScheduler::step`] or one of the `run_*` methods, so every
//! interleaving of delivery and acknowledgment can be reproduced exactly.
//! Reported failures are kept for inspection instead of being logged away.

use super::{Scheduler, Task};
use crate::error::Error;
use crate::tracing_compat::trace;
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};

/// A FIFO scheduler that runs tasks only when asked.
pub struct LabScheduler {
    queue: SegQueue<Task>,
    failures: Mutex<Vec<Error>>,
    steps: AtomicU64,
}

impl LabScheduler {
    /// Creates an empty lab scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            failures: Mutex::new(Vec::new()),
            steps: AtomicU64::new(0),
        }
    }

    /// Runs the oldest queued task. Returns false if the queue was empty.
    ///
    /// A panicking task is recorded as a failure.
    pub fn step(&self) -> bool {
        let Some(task) = self.queue.pop() else {
            return false;
        };
        self.steps.fetch_add(1, Ordering::Relaxed);
        trace!(step = self.steps(), "lab step");
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            self.failures
                .lock()
                .push(Error::from_panic(payload).with_context("lab task"));
        }
        true
    }

    /// Steps until no task is queued. Returns the number of tasks run.
    ///
    /// Never returns for a producer that keeps rescheduling itself; use
    /// [`run_for`](Self::run_for) for unbounded sources.
    pub fn run_until_quiescent(&self) -> usize {
        let mut ran = 0;
        while self.step() {
            ran += 1;
        }
        ran
    }

    /// Runs at most `max_steps` tasks. Returns the number actually run.
    pub fn run_for(&self, max_steps: usize) -> usize {
        let mut ran = 0;
        while ran < max_steps && self.step() {
            ran += 1;
        }
        ran
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of tasks run so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Failures reported so far, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<Error> {
        self.failures.lock().clone()
    }
}

impl Default for LabScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for LabScheduler {
    fn trampoline(&self, task: Task) {
        self.queue.push(task);
    }

    fn report_failure(&self, failure: Error) {
        trace!(%failure, "lab failure recorded");
        self.failures.lock().push(failure);
    }

    fn name(&self) -> &'static str {
        "lab"
    }
}

impl fmt::Debug for LabScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabScheduler")
            .field("pending", &self.pending())
            .field("steps", &self.steps())
            .field("failures", &self.failures.lock().len())
            .finish()
    }
}
