//! Error types for event delivery.
//!
//! Every failure that can travel through the `on_error` channel of a
//! [`Subscriber`](crate::subscriber::Subscriber), or end up in a scheduler's
//! failure sink, is an [`Error`]. Errors are cheap to clone so a memoized
//! failure can be replayed to any number of subscribers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The category of a delivery failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Failure raised by user code (an evaluated expression, an async ack).
    User,
    /// The producer failed while computing the next value.
    Producer,
    /// A callback panicked; the payload was captured.
    Panicked,
    /// A counter ran past its representable range.
    Overflow,
    /// A promise was dropped without being completed.
    Abandoned,
}

impl ErrorKind {
    /// Returns the kind name as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Producer => "producer",
            Self::Panicked => "panicked",
            Self::Overflow => "overflow",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery failure with kind, optional context and optional source.
///
/// # Example
///
/// ```
/// use ackstream::error::{Error, ErrorKind};
///
/// let err = Error::user("boom").with_context("element 3");
/// assert_eq!(err.kind(), ErrorKind::User);
/// assert!(err.to_string().contains("boom"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error{}", display_context(.message, .context))]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    context: Option<String>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

fn display_context(message: &Option<String>, context: &Option<String>) -> String {
    match (message, context) {
        (Some(msg), Some(ctx)) => format!(": {msg} ({ctx})"),
        (Some(msg), None) => format!(": {msg}"),
        (None, Some(ctx)) => format!(" ({ctx})"),
        (None, None) => String::new(),
    }
}

impl Error {
    /// Creates an error of the given kind with no message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: None,
            source: None,
        }
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(message)
    }

    /// Creates a producer-side failure with a message.
    #[must_use]
    pub fn producer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Producer).with_message(message)
    }

    /// Creates an overflow error.
    #[must_use]
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Overflow).with_message(message)
    }

    /// Creates the error used when a promise is dropped unsettled.
    #[must_use]
    pub fn abandoned() -> Self {
        Self::new(ErrorKind::Abandoned).with_message("promise dropped before completion")
    }

    /// Converts a panic payload captured by `catch_unwind` into an error.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Wraps an arbitrary error as a user failure.
    #[must_use]
    pub fn from_source<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorKind::User)
            .with_message(source.to_string())
            .with_source(source)
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches context describing what was being delivered.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if this error was produced from a captured panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }
}

/// Result alias for fallible value computation.
pub type Result<T> = std::result::Result<T, Error>;
