#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use ackstream::{Ack, FnSubscriber, SchedulerRef};
use parking_lot::Mutex;
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::{Arc, Once};

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_ACE5;

const PROPTEST_SEED_ENV: &str = "ACKSTREAM_PROPTEST_SEED";

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ackstream=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_thread_ids(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

/// One observed grammar event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ev<T> {
    Next(T),
    Error(String),
    Complete,
}

/// Thread-safe event log fed by [`Log::subscriber`].
#[derive(Debug)]
pub struct Log<T> {
    events: Arc<Mutex<Vec<Ev<T>>>>,
}

impl<T> Clone for Log<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T: Clone + Send + 'static> Log<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<Ev<T>> {
        self.events.lock().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Ev::Next(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| !matches!(event, Ev::Next(_)))
            .count()
    }

    /// True if the log matches `on_next* (on_complete | on_error)?`.
    pub fn obeys_grammar(&self) -> bool {
        let events = self.events.lock();
        events
            .iter()
            .position(|event| !matches!(event, Ev::Next(_)))
            .is_none_or(|terminal| terminal + 1 == events.len())
    }

    /// A subscriber that records into this log and answers with `respond`.
    pub fn subscriber<F>(&self, scheduler: SchedulerRef, mut respond: F) -> FnSubscriber<T>
    where
        F: FnMut(&T) -> Ack + Send + 'static,
    {
        let (next, error, complete) = (self.clone(), self.clone(), self.clone());
        FnSubscriber::new(scheduler)
            .with_next(move |value: T| {
                next.events.lock().push(Ev::Next(value.clone()));
                respond(&value)
            })
            .with_error(move |err| error.events.lock().push(Ev::Error(err.to_string())))
            .with_complete(move || complete.events.lock().push(Ev::Complete))
    }

    /// A subscriber that records into this log and always continues.
    pub fn continuing(&self, scheduler: SchedulerRef) -> FnSubscriber<T> {
        self.subscriber(scheduler, |_| Ack::Continue)
    }
}
