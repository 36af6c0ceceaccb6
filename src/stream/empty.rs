//! Producers that never emit a value.
//!
//! Both are zero-sized and exist once per process; [`empty`] and [`never`]
//! hand out references to the same instances for every element type.

use super::{Observable, Source};
use crate::cancel::CancellationToken;
use crate::subscriber::BoxSubscriber;

struct Empty;

impl<T> Source<T> for Empty {
    fn attach(&self, mut subscriber: BoxSubscriber<T>) -> CancellationToken {
        subscriber.on_complete();
        CancellationToken::inert()
    }
}

struct Never;

impl<T> Source<T> for Never {
    fn attach(&self, _subscriber: BoxSubscriber<T>) -> CancellationToken {
        CancellationToken::inert()
    }
}

static EMPTY: Empty = Empty;
static NEVER: Never = Never;

/// Completes immediately without emitting.
#[must_use]
pub fn empty<T: 'static>() -> Observable<T> {
    Observable::from_static(&EMPTY)
}

/// Never emits, completes or fails.
#[must_use]
pub fn never<T: 'static>() -> Observable<T> {
    Observable::from_static(&NEVER)
}
