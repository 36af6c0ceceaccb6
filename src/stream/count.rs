//! An unbounded producer counting up from zero.
//!
//! Emits `0, 1, 2, ...` with back-pressure until the subscriber answers
//! `Stop` or the subscription is cancelled. Values never repeat and never
//! skip; once `u64::MAX` has been emitted the producer fails with an
//! [`Overflow`](crate::error::ErrorKind::Overflow) error instead of wrapping.

use super::delivery::{Cursor, DeliveryLoop};
use super::{Observable, Source};
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::runtime::{self, SchedulerRef};
use crate::subscriber::BoxSubscriber;
use std::sync::Arc;

struct Counter {
    next: Option<u64>,
}

impl Cursor for Counter {
    type Item = u64;

    fn advance(&mut self) -> Option<Result<u64, Error>> {
        match self.next {
            Some(current) => {
                self.next = current.checked_add(1);
                Some(Ok(current))
            }
            None => Some(Err(Error::overflow("counter passed u64::MAX"))),
        }
    }
}

/// The counting producer. Created by [`count`].
pub struct Count {
    start: u64,
    scheduler: SchedulerRef,
}

impl Source<u64> for Count {
    fn attach(&self, subscriber: BoxSubscriber<u64>) -> CancellationToken {
        let cursor = Counter {
            next: Some(self.start),
        };
        DeliveryLoop::start(cursor, subscriber, Arc::clone(&self.scheduler))
    }
}

/// Counts up from zero, scheduling on `scheduler`.
#[must_use]
pub fn count(scheduler: SchedulerRef) -> Observable<u64> {
    Observable::new(Count {
        start: 0,
        scheduler,
    })
}

/// Like [`count`], on the process-wide default scheduler.
#[must_use]
pub fn count_default() -> Observable<u64> {
    count(runtime::global())
}
