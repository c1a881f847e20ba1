//! Bounded job queue.
//!
//! [`BoundedQueue`] is the job channel between the dispatcher and the worker
//! pool. It is generic over the item type, so it can be tested on its own and
//! reused outside the pool.
//!
//! Failed enqueues hand the item back inside the [`QueueError`], so a rejected
//! job is never lost silently: the caller decides whether to retry, drop or
//! close it.
//!
//! ```rust
//! use rust_work_queue::queue::{BoundedQueue, QueueError};
//!
//! let queue = BoundedQueue::new(1);
//! queue.try_send("a").unwrap();
//!
//! match queue.try_send("b") {
//!     Err(QueueError::Full(item)) => assert_eq!(item, "b"),
//!     other => panic!("expected Full, got {:?}", other),
//! }
//! ```

mod bounded;

pub use bounded::BoundedQueue;

use crate::core::PoolError;

/// Errors that can occur during queue operations.
///
/// Variants produced by enqueue operations carry the rejected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError<T> {
    /// Queue is at capacity (non-blocking enqueue)
    Full(T),
    /// Queue is closed and not accepting new items
    Closed(T),
    /// No space became available within the timeout
    Timeout(T),
    /// Queue is open but has no items (non-blocking or timed dequeue)
    Empty,
    /// Queue is closed and fully drained; no item will ever arrive
    Disconnected,
}

impl<T> QueueError<T> {
    /// Recover the rejected item, if this error carries one
    pub fn into_inner(self) -> Option<T> {
        match self {
            QueueError::Full(item) | QueueError::Closed(item) | QueueError::Timeout(item) => {
                Some(item)
            }
            QueueError::Empty | QueueError::Disconnected => None,
        }
    }

    /// Returns `true` if the queue was closed when the operation ran
    pub fn is_closed(&self) -> bool {
        matches!(self, QueueError::Closed(_) | QueueError::Disconnected)
    }

    /// Convert into a [`PoolError`], dropping any carried item
    pub fn into_pool_error(self, capacity: usize) -> PoolError {
        match self {
            QueueError::Full(_) => PoolError::queue_full(capacity, capacity),
            QueueError::Closed(_) | QueueError::Disconnected => PoolError::QueueClosed,
            QueueError::Timeout(_) => PoolError::other("timed out waiting for queue space"),
            QueueError::Empty => PoolError::other("queue is empty"),
        }
    }
}

impl<T> std::fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Full(_) => write!(f, "queue is full"),
            QueueError::Closed(_) => write!(f, "queue is closed"),
            QueueError::Timeout(_) => write!(f, "operation timed out"),
            QueueError::Empty => write!(f, "queue is empty"),
            QueueError::Disconnected => write!(f, "queue is closed and drained"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for QueueError<T> {}

impl<T> From<QueueError<T>> for PoolError {
    /// Capacity is unknown here; use [`QueueError::into_pool_error`] to keep it
    fn from(err: QueueError<T>) -> Self {
        err.into_pool_error(0)
    }
}

/// Result type for queue operations; `T` is the item type carried back on failure.
pub type QueueResult<R, T> = std::result::Result<R, QueueError<T>>;
