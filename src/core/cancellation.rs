//! Cooperative job cancellation
//!
//! Every [`Job`](crate::core::Job) carries a [`CancellationToken`]. The token is
//! bound to the job's deadline: once the deadline passes it reports itself as
//! cancelled with [`CancellationReason::Timeout`], without any timer thread. The
//! worker pool cancels in-flight tokens explicitly with
//! [`CancellationReason::Shutdown`] when a shutdown runs out of time.
//!
//! Handlers never get preempted. They are expected to poll
//! [`is_cancelled()`](CancellationToken::is_cancelled) or park on
//! [`wait_timeout()`](CancellationToken::wait_timeout) between blocking steps.
//!
//! # Example
//!
//! ```rust
//! use rust_work_queue::CancellationToken;
//! use std::time::{Duration, Instant};
//!
//! let token = CancellationToken::with_deadline(Instant::now() + Duration::from_millis(20));
//! assert!(!token.is_cancelled());
//!
//! // Parks until the deadline passes
//! assert!(token.wait_timeout(Duration::from_secs(5)));
//! assert!(token.is_cancelled());
//! ```

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()`
    Manual,
    /// The job's deadline elapsed
    Timeout,
    /// The pool ran out of shutdown budget while the job was running
    Shutdown,
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Timeout => write!(f, "timeout: job deadline exceeded"),
            CancellationReason::Shutdown => write!(f, "pool shutting down"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

struct CancellationTokenInner {
    cancelled: AtomicBool,
    reason: RwLock<Option<CancellationReason>>,
    deadline: Option<Instant>,
    /// Parking spot for `wait_timeout`
    lock: Mutex<()>,
    condvar: Condvar,
}

/// A thread-safe cancellation token shared between a job, its handler and the pool
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

impl CancellationToken {
    /// Create a new token without a deadline
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a token that reports cancellation once `deadline` has passed
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner {
                cancelled: AtomicBool::new(false),
                reason: RwLock::new(None),
                deadline,
                lock: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Cancel this token with reason [`CancellationReason::Manual`]
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token with a specific reason
    ///
    /// Only the first call records its reason; later calls are no-ops.
    /// Wakes every thread parked in [`wait_timeout()`](Self::wait_timeout).
    pub fn cancel_with_reason(&self, reason: CancellationReason) {
        {
            let mut slot = self.inner.reason.write();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason);
            // The flag goes up only once the reason is readable
            self.inner.cancelled.store(true, Ordering::Release);
        }

        let _guard = self.inner.lock.lock();
        self.inner.condvar.notify_all();
    }

    /// Check if this token has been cancelled or its deadline has passed
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire) || self.is_expired()
    }

    /// Returns `true` if the token carries a deadline that has passed
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns the cancellation reason, if cancelled
    ///
    /// An explicit reason wins over an expired deadline.
    pub fn reason(&self) -> Option<CancellationReason> {
        if let Some(reason) = self.inner.reason.read().clone() {
            return Some(reason);
        }
        if self.is_expired() {
            Some(CancellationReason::Timeout)
        } else {
            None
        }
    }

    /// The deadline this token is bound to, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline, or `None` for tokens without one
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Block for up to `timeout`, returning early on cancellation or deadline
    ///
    /// Returns `true` if the token is cancelled when the call returns. Handlers
    /// use this in place of `thread::sleep` so they stay responsive.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let now = Instant::now();
        let mut wake_at = now.checked_add(timeout);
        if let Some(deadline) = self.inner.deadline {
            wake_at = Some(wake_at.map_or(deadline, |at| at.min(deadline)));
        }

        let mut guard = self.inner.lock.lock();
        while !self.inner.cancelled.load(Ordering::Acquire) {
            match wake_at {
                Some(at) => {
                    if Instant::now() >= at {
                        break;
                    }
                    self.inner.condvar.wait_until(&mut guard, at);
                }
                None => self.inner.condvar.wait(&mut guard),
            }
        }
        drop(guard);

        self.is_cancelled()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancellation_token_creation() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
        assert_eq!(token.remaining(), None);
    }

    #[test]
    fn test_cancellation_token_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Manual));

        // Idempotent - first reason sticks
        token.cancel_with_reason(CancellationReason::Shutdown);
        assert_eq!(token.reason(), Some(CancellationReason::Manual));
    }

    #[test]
    fn test_cancellation_token_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();

        clone.cancel_with_reason(CancellationReason::Shutdown);
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::Shutdown));
    }

    #[test]
    fn test_deadline_expiry_reports_timeout() {
        let token = CancellationToken::with_deadline(Instant::now() + Duration::from_millis(10));
        assert!(!token.is_cancelled());

        thread::sleep(Duration::from_millis(30));
        assert!(token.is_cancelled());
        assert!(token.is_expired());
        assert_eq!(token.reason(), Some(CancellationReason::Timeout));
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_wait_timeout_returns_false_when_not_cancelled() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_wakes_on_cancel() {
        let token = CancellationToken::new();
        let canceller = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_stops_at_deadline() {
        let token = CancellationToken::with_deadline(Instant::now() + Duration::from_millis(20));
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_reason_visible_as_soon_as_cancelled() {
        for _ in 0..200 {
            let token = CancellationToken::new();
            let canceller = token.clone();

            let handle = thread::spawn(move || {
                canceller.cancel_with_reason(CancellationReason::Shutdown);
            });

            while !token.is_cancelled() {
                std::hint::spin_loop();
            }
            assert_eq!(token.reason(), Some(CancellationReason::Shutdown));
            handle.join().expect("Canceller thread panicked");
        }
    }

    #[test]
    fn test_racing_cancellers_record_one_reason() {
        let token = CancellationToken::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let token = token.clone();
                thread::spawn(move || {
                    token.cancel_with_reason(CancellationReason::Custom(format!("canceller-{}", i)));
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Canceller thread panicked");
        }

        let first = token.reason().expect("Token should carry a reason");
        token.cancel_with_reason(CancellationReason::Manual);
        assert_eq!(token.reason(), Some(first));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(CancellationReason::Manual.to_string(), "manually cancelled");
        assert!(CancellationReason::Timeout.to_string().starts_with("timeout"));
        assert_eq!(
            CancellationReason::Custom("client went away".into()).to_string(),
            "client went away"
        );
    }
}
