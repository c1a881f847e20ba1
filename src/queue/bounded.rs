//! Bounded FIFO queue with capacity limit and explicit close.

use super::{QueueError, QueueResult};
use crate::core::{PoolError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A bounded, thread-safe FIFO queue with blocking and non-blocking operations.
///
/// All state lives behind one mutex; producers park on `not_full`, consumers
/// on `not_empty`, both tied to that mutex so a close or a pop can never be
/// missed by a parked thread.
///
/// Closing stops producers, not consumers: items already queued keep being
/// delivered, and only once the queue is closed *and* empty do dequeues fail
/// with [`QueueError::Disconnected`].
///
/// # Example
///
/// ```rust
/// use rust_work_queue::queue::{BoundedQueue, QueueError};
///
/// let queue = BoundedQueue::new(2);
/// queue.enqueue("A", false).unwrap();
/// queue.enqueue("B", false).unwrap();
/// assert!(matches!(queue.enqueue("C", false), Err(QueueError::Full("C"))));
///
/// queue.close();
/// assert_eq!(queue.dequeue().unwrap(), "A");
/// assert_eq!(queue.dequeue().unwrap(), "B");
/// assert!(matches!(queue.dequeue(), Err(QueueError::Disconnected)));
/// ```
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a new bounded queue with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Creates a new bounded queue, rejecting a zero capacity with an error.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PoolError::invalid_config(
                "queue_capacity",
                "Queue capacity must be greater than 0",
            ));
        }
        Ok(Self::new(capacity))
    }

    /// Returns the maximum capacity of this queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue an item, either waiting for space (`blocking`) or failing fast.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Closed`] if the queue is closed, or gets closed while waiting
    /// - [`QueueError::Full`] if the queue is full and `blocking` is false
    pub fn enqueue(&self, item: T, blocking: bool) -> QueueResult<(), T> {
        if blocking {
            self.send(item)
        } else {
            self.try_send(item)
        }
    }

    /// Enqueue an item, blocking until space is available.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue is closed before space frees up.
    pub fn send(&self, item: T) -> QueueResult<(), T> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueError::Closed(item));
            }
            if state.items.len() < self.capacity {
                self.push_locked(&mut state, item);
                return Ok(());
            }
            self.not_full.wait(&mut state);
        }
    }

    /// Attempts to enqueue an item without blocking.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] if the queue is at capacity
    /// - [`QueueError::Closed`] if the queue has been closed
    pub fn try_send(&self, item: T) -> QueueResult<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(QueueError::Full(item));
        }
        self.push_locked(&mut state, item);
        Ok(())
    }

    /// Enqueue an item, waiting at most `timeout` for space.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Timeout`] if no space became available in time
    /// - [`QueueError::Closed`] if the queue has been closed
    pub fn send_timeout(&self, item: T, timeout: Duration) -> QueueResult<(), T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueError::Closed(item));
            }
            if state.items.len() < self.capacity {
                self.push_locked(&mut state, item);
                return Ok(());
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(QueueError::Timeout(item));
                    }
                    self.not_full.wait_until(&mut state, deadline);
                }
                None => self.not_full.wait(&mut state),
            }
        }
    }

    fn push_locked(&self, state: &mut QueueState<T>, item: T) {
        state.items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Dequeue the oldest item, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disconnected`] once the queue is closed and empty.
    pub fn dequeue(&self) -> QueueResult<T, T> {
        self.recv()
    }

    /// Alias of [`dequeue()`](Self::dequeue).
    pub fn recv(&self) -> QueueResult<T, T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.pop_locked(&mut state) {
                return Ok(item);
            }
            if state.closed {
                return Err(QueueError::Disconnected);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Attempts to dequeue without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(item)` if an item was available
    /// - `Err(QueueError::Empty)` if the queue is open and empty
    /// - `Err(QueueError::Disconnected)` if the queue is closed and empty
    pub fn try_dequeue(&self) -> QueueResult<T, T> {
        self.try_recv()
    }

    /// Alias of [`try_dequeue()`](Self::try_dequeue).
    pub fn try_recv(&self) -> QueueResult<T, T> {
        let mut state = self.state.lock();
        match self.pop_locked(&mut state) {
            Some(item) => Ok(item),
            None if state.closed => Err(QueueError::Disconnected),
            None => Err(QueueError::Empty),
        }
    }

    /// Dequeue with a timeout.
    ///
    /// # Returns
    ///
    /// - `Ok(item)` if an item was received within the timeout
    /// - `Err(QueueError::Empty)` if nothing arrived in time
    /// - `Err(QueueError::Disconnected)` if the queue is closed and empty
    pub fn recv_timeout(&self, timeout: Duration) -> QueueResult<T, T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if let Some(item) = self.pop_locked(&mut state) {
                return Ok(item);
            }
            if state.closed {
                return Err(QueueError::Disconnected);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(QueueError::Empty);
                    }
                    self.not_empty.wait_until(&mut state, deadline);
                }
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    fn pop_locked(&self, state: &mut QueueState<T>) -> Option<T> {
        let item = state.items.pop_front()?;
        self.not_full.notify_one();
        Some(item)
    }

    /// Closes the queue.
    ///
    /// Blocked producers fail with [`QueueError::Closed`]; blocked consumers
    /// keep draining and then fail with [`QueueError::Disconnected`].
    /// Returns `true` only for the call that actually closed the queue.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
        true
    }

    /// Returns `true` if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the current number of queued items (snapshot).
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no items are queued (snapshot).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the queue is at capacity (snapshot).
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
