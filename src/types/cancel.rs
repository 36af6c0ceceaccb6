//! Why a subscription was cancelled.
//!
//! Cancelling a subscription is a silent external stop: it never produces a
//! terminal event. The reason is only kept for logging and for callers that
//! inspect a cancelled token.

use core::fmt;

/// The reason recorded by the first cancellation of a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReason {
    /// Optional caller-supplied note, e.g. `"consumer left"`.
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// A cancellation without a note, as recorded by `cancel()`.
    #[must_use]
    pub const fn unspecified() -> Self {
        Self { message: None }
    }

    /// A cancellation carrying `message`.
    #[must_use]
    pub const fn because(message: &'static str) -> Self {
        Self {
            message: Some(message),
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(msg) => write!(f, "cancelled: {msg}"),
            None => f.write_str("cancelled"),
        }
    }
}
