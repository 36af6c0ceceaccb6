//! Optional tracing integration.
//!
//! With the `tracing-integration` feature enabled (the default) the macros
//! below are the `tracing` crate's own. Without it they expand to nothing, so
//! the delivery loop carries no logging cost at all.
//!
//! ```ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! debug!(len = 3, "subscription started");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    #[macro_export]
    #[doc(hidden)]
    macro_rules! __ackstream_noop_log {
        ($($arg:tt)*) => {};
    }

    pub use crate::__ackstream_noop_log as debug;
    pub use crate::__ackstream_noop_log as error;
    pub use crate::__ackstream_noop_log as info;
    pub use crate::__ackstream_noop_log as trace;
    pub use crate::__ackstream_noop_log as warn;
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::{debug, error, info, trace, warn};

/// Returns true when log records are actually emitted.
#[must_use]
pub const fn enabled() -> bool {
    cfg!(feature = "tracing-integration")
}
