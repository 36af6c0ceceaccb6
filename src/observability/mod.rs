//! Observability for event delivery.
//!
//! - [`level`]: the severity used when a scheduler reports a failure that
//!   could not travel through the subscriber grammar.

pub mod level;

pub use level::{LogLevel, ParseLevelError};
