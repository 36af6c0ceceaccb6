//! Finite producers over an in-memory sequence.
//!
//! The elements are stored once, behind an `Arc<[T]>`, and every
//! subscription walks them with its own index. Each element is cloned on
//! emission, so subscriptions never interfere with one another.

use super::delivery::{Cursor, DeliveryLoop};
use super::{Observable, Source};
use crate::cancel::CancellationToken;
use crate::error::Error;
use crate::runtime::{self, SchedulerRef};
use crate::subscriber::BoxSubscriber;
use std::sync::Arc;

struct SliceCursor<T> {
    items: Arc<[T]>,
    index: usize,
}

impl<T: Clone + Send + Sync + 'static> Cursor for SliceCursor<T> {
    type Item = T;

    fn advance(&mut self) -> Option<Result<T, Error>> {
        let item = self.items.get(self.index)?.clone();
        self.index += 1;
        Some(Ok(item))
    }

    fn is_exhausted(&self) -> bool {
        self.index >= self.items.len()
    }
}

/// A producer emitting each element of a fixed sequence, then completing.
///
/// Created by [`from_vec`], [`from_iter`] and [`items!`](crate::items).
pub struct Iter<T> {
    items: Arc<[T]>,
    scheduler: SchedulerRef,
}

impl<T> Iter<T> {
    /// Number of elements each subscription will receive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if subscriptions complete without any value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> Source<T> for Iter<T> {
    fn attach(&self, subscriber: BoxSubscriber<T>) -> CancellationToken {
        let cursor = SliceCursor {
            items: Arc::clone(&self.items),
            index: 0,
        };
        DeliveryLoop::start(cursor, subscriber, Arc::clone(&self.scheduler))
    }
}

/// Emits the elements of `items` in order, scheduling on `scheduler`.
///
/// ```
/// use ackstream::runtime::TrampolineScheduler;
/// use ackstream::stream::from_vec;
/// use ackstream::types::Ack;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// from_vec(vec![1, 2, 3], Arc::new(TrampolineScheduler::default())).subscribe(
///     move |v| {
///         sink.lock().unwrap().push(v);
///         Ack::Continue
///     },
///     |_| {},
///     || {},
/// );
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
/// ```
#[must_use]
pub fn from_vec<T>(items: Vec<T>, scheduler: SchedulerRef) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    Observable::new(Iter {
        items: items.into(),
        scheduler,
    })
}

/// Collects `iter` and emits its elements in order.
#[must_use]
pub fn from_iter<I>(iter: I, scheduler: SchedulerRef) -> Observable<I::Item>
where
    I: IntoIterator,
    I::Item: Clone + Send + Sync + 'static,
{
    Observable::new(Iter {
        items: iter.into_iter().collect(),
        scheduler,
    })
}

/// Like [`from_vec`], on the process-wide default scheduler.
#[must_use]
pub fn from_vec_default<T>(items: Vec<T>) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    from_vec(items, runtime::global())
}

/// Builds a finite producer from its arguments.
///
/// `items![a, b, c]` uses the process-wide default scheduler;
/// `items![on scheduler; a, b, c]` uses the given one.
///
/// ```
/// use ackstream::items;
/// use ackstream::runtime::{SchedulerRef, TrampolineScheduler};
/// use std::sync::Arc;
///
/// let scheduler: SchedulerRef = Arc::new(TrampolineScheduler::default());
/// let _letters = items![on scheduler; 'a', 'b'];
/// let _numbers = items![1, 2, 3];
/// ```
#[macro_export]
macro_rules! items {
    (on $scheduler:expr; $($item:expr),* $(,)?) => {
        $crate::stream::from_vec(::std::vec![$($item),*], $scheduler)
    };
    ($($item:expr),* $(,)?) => {
        $crate::stream::from_vec_default(::std::vec![$($item),*])
    };
}
