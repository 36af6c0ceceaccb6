//! A producer of exactly one value.

use super::{Observable, Source};
use crate::cancel::CancellationToken;
use crate::subscriber::BoxSubscriber;

struct Pure<T> {
    value: T,
}

impl<T: Clone + Send + Sync> Source<T> for Pure<T> {
    fn attach(&self, mut subscriber: BoxSubscriber<T>) -> CancellationToken {
        // Completion is not back-pressured here; a SafeSubscriber holds it
        // until the value's ack resolves to Continue.
        let _ = subscriber.on_next(self.value.clone());
        subscriber.on_complete();
        CancellationToken::inert()
    }
}

/// Emits `value`, then completes.
#[must_use]
pub fn pure<T>(value: T) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    Observable::new(Pure { value })
}
