//! Ackstream: push-based event streams with acknowledgment back-pressure.
//!
//! # Overview
//!
//! A producer pushes values into a [`Subscriber`]; every delivery returns an
//! [`Ack`] saying whether the consumer wants more. The producer never emits
//! the next value before the previous acknowledgment is known, whether it
//! arrives synchronously or later through a deferred handle. That single
//! rule is the whole back-pressure protocol.
//!
//! # Core Guarantees
//!
//! - **Grammar**: subscribers attached through [`SafeSubscriber`] observe
//!   `on_next* (on_complete | on_error)?`, regardless of consumer misbehavior
//! - **Ordered delivery**: value N+1 is never emitted before the ack for value N resolved
//! - **Stack safety**: synchronous `Continue` runs of any length use bounded stack
//! - **Silent stops**: `Stop` acks and cancellation never produce terminal events
//! - **Contained failures**: consumer panics become `on_error`, or go to the
//!   scheduler's failure sink when the grammar has no room for them
//!
//! # Module Structure
//!
//! - [`types`]: [`Ack`], [`SyncAck`] and cancellation reasons
//! - [`deferred`]: settle-once handles used for asynchronous acks
//! - [`subscriber`]: the [`Subscriber`] contract and [`SafeSubscriber`]
//! - [`stream`]: [`Observable`], the delivery loop, builders and operators
//! - [`cancel`]: [`CancellationToken`]
//! - [`runtime`]: the [`Scheduler`] capability and its implementations
//! - [`config`]: scheduler configuration from code, environment or TOML
//! - [`error`](mod@error): error types
//! - [`observability`]: failure log levels
//! - [`tracing_compat`]: optional tracing integration (`tracing-integration` feature)
//!
//! # Example
//!
//! ```
//! use ackstream::runtime::{SchedulerRef, TrampolineScheduler};
//! use ackstream::stream::count;
//! use ackstream::subscriber::FnSubscriber;
//! use ackstream::types::Ack;
//! use std::sync::{Arc, Mutex};
//!
//! let scheduler: SchedulerRef = Arc::new(TrampolineScheduler::default());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! count(Arc::clone(&scheduler)).subscribe_with(FnSubscriber::new(scheduler).with_next(
//!     move |n| {
//!         sink.lock().unwrap().push(n);
//!         if n < 4 { Ack::Continue } else { Ack::Stop }
//!     },
//! ));
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod cancel;
pub mod config;
pub mod deferred;
pub mod error;
pub mod observability;
pub mod runtime;
pub mod stream;
pub mod subscriber;
pub mod tracing_compat;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use cancel::CancellationToken;
pub use config::{ConfigError, SchedulerConfig};
pub use deferred::{Deferred, Promise};
pub use error::{Error, ErrorKind, Result};
pub use runtime::{LabScheduler, Scheduler, SchedulerRef, TrampolineScheduler};
pub use stream::{Observable, Operator, Source};
pub use subscriber::{BoxSubscriber, FnSubscriber, SafeSubscriber, Subscriber};
pub use types::{Ack, CancelReason, SyncAck};
