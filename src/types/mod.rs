//! Core types for event delivery.
//!
//! - [`ack`]: acknowledgments (`Ack`, `SyncAck`) and their combinators
//! - [`cancel`]: cancellation reasons

pub mod ack;
pub mod cancel;

pub use ack::{Ack, SyncAck};
pub use cancel::CancelReason;
