//! Test helpers shared by unit and integration tests.
//!
//! - [`init_test_logging`] installs a `tracing` subscriber once per process,
//!   filtered by `RUST_LOG` (default `ackstream=debug`).
//! - [`test_phase!`](crate::test_phase), [`test_complete!`](crate::test_complete)
//!   and [`assert_with_log!`](crate::assert_with_log) keep test output
//!   structured so failures read the same across suites.
//! - [`EventLog`] and [`Recorder`] capture the exact sequence of grammar
//!   events a subscriber observed.

use crate::error::Error;
use crate::runtime::SchedulerRef;
use crate::subscriber::Subscriber;
use crate::types::Ack;
use parking_lot::Mutex;
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Installs the test `tracing` subscriber. Safe to call from every test.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ackstream=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Marks the start of a test.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "test phase: start");
    };
}

/// Marks the successful end of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        ::tracing::info!(test = %$name, "test phase: complete");
    };
}

/// Asserts `cond`, logging the expected and actual values either way.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $what:expr, $expected:expr, $actual:expr $(,)?) => {{
        let ok: bool = $cond;
        let (__expected, __actual) = (&$expected, &$actual);
        if ok {
            ::tracing::debug!(check = %$what, expected = ?__expected, actual = ?__actual, "ok");
        } else {
            ::tracing::error!(check = %$what, expected = ?__expected, actual = ?__actual, "failed");
        }
        assert!(
            ok,
            "{}: expected {:?}, got {:?}",
            $what, __expected, __actual
        );
    }};
}

/// One observed grammar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    /// `on_next(value)`.
    Next(T),
    /// `on_error(message)`.
    Error(String),
    /// `on_complete()`.
    Complete,
}

/// Shared, thread-safe log of grammar events.
#[derive(Debug)]
pub struct EventLog<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Clone for EventLog<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T> Default for EventLog<T> {
    fn default() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> EventLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&self, event: Event<T>) {
        self.events.lock().push(event);
    }

    /// Returns a copy of every event observed so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event<T>> {
        self.events.lock().clone()
    }

    /// Returns the values delivered through `on_next`, in order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Next(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of terminal events (`on_complete` + `on_error`).
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, Event::Next(_)))
            .count()
    }

    /// Returns true if the log obeys `on_next* (on_complete | on_error)?`.
    #[must_use]
    pub fn obeys_grammar(&self) -> bool {
        let events = self.events.lock();
        match events.iter().position(|event| !matches!(event, Event::Next(_))) {
            None => true,
            Some(terminal) => terminal == events.len() - 1,
        }
    }
}

/// A subscriber that records every event and answers with a scripted ack.
pub struct Recorder<T> {
    log: EventLog<T>,
    respond: Box<dyn FnMut(&T) -> Ack + Send>,
    scheduler: SchedulerRef,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    /// Records into `log`, always answering `Continue`.
    pub fn new(log: EventLog<T>, scheduler: SchedulerRef) -> Self {
        Self::with_response(log, scheduler, |_| Ack::Continue)
    }

    /// Records into `log`, answering with `respond(value)`.
    pub fn with_response(
        log: EventLog<T>,
        scheduler: SchedulerRef,
        respond: impl FnMut(&T) -> Ack + Send + 'static,
    ) -> Self {
        Self {
            log,
            respond: Box::new(respond),
            scheduler,
        }
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> for Recorder<T> {
    fn on_next(&mut self, value: T) -> Ack {
        let ack = (self.respond)(&value);
        self.log.push(Event::Next(value));
        ack
    }

    fn on_error(&mut self, error: Error) {
        self.log.push(Event::Error(error.to_string()));
    }

    fn on_complete(&mut self) {
        self.log.push(Event::Complete);
    }

    fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }
}
