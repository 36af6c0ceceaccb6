//! Scheduling capabilities used by producers and subscribers.
//!
//! The delivery engine never recurses to emit the next value and never
//! panics its way out of a terminal handler. Both concerns are delegated to
//! an injected [`Scheduler`]:
//!
//! - [`Scheduler::trampoline`] runs a continuation *next*, without nesting
//!   the caller's stack frame, preserving the order of continuations
//!   scheduled from the same loop;
//! - [`Scheduler::report_failure`] is the sink for errors that cannot be
//!   expressed in the subscriber grammar.
//!
//! Implementations:
//!
//! - [`TrampolineScheduler`]: a per-thread run queue drained by the first
//!   caller. The production default.
//! - [`LabScheduler`]: a manually stepped queue for deterministic tests.
//!
//! [`global`] returns a process-wide `TrampolineScheduler` for convenience
//! constructors; the engine itself always receives its scheduler explicitly.

pub mod lab;
pub mod trampoline;

pub use lab::LabScheduler;
pub use trampoline::{FailureSink, TrampolineScheduler};

use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::tracing_compat::warn;
use std::sync::{Arc, OnceLock};

/// A zero-argument continuation handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduling capability.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// The scheduling capability attached to every subscriber and producer.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run next without growing the caller's stack.
    ///
    /// Tasks scheduled from the same thread run in submission order.
    fn trampoline(&self, task: Task);

    /// Reports a failure that could not be delivered through the grammar.
    fn report_failure(&self, failure: Error);

    /// Short name used in log records.
    fn name(&self) -> &'static str {
        "scheduler"
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn trampoline(&self, task: Task) {
        (**self).trampoline(task);
    }

    fn report_failure(&self, failure: Error) {
        (**self).report_failure(failure);
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

static GLOBAL: OnceLock<SchedulerRef> = OnceLock::new();

/// Returns the process-wide default scheduler.
///
/// Created on first use from [`SchedulerConfig::from_env`]; invalid
/// environment values fall back to the defaults with a warning.
#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
pub fn global() -> SchedulerRef {
    Arc::clone(GLOBAL.get_or_init(|| {
        let config = SchedulerConfig::from_env().unwrap_or_else(|err| {
            warn!(error = %err, "invalid scheduler environment, using defaults");
            SchedulerConfig::default()
        });
        Arc::new(TrampolineScheduler::new(config))
    }))
}

/// Installs `scheduler` as the process-wide default.
///
/// Returns the scheduler back if a default was already initialised.
pub fn set_global(scheduler: SchedulerRef) -> Result<(), SchedulerRef> {
    GLOBAL.set(scheduler)
}
