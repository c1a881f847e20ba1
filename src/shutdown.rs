//! Shutdown coordination for a worker pool and its dispatcher.
//!
//! [`ShutdownCoordinator`] drives the pool through
//! `Running → Draining → Stopped`. Any party holding a clone of its
//! [`ShutdownSignal`] (a signal handler, a stdin watcher, a test) can request
//! the stop; the owner then calls [`shutdown()`](ShutdownCoordinator::shutdown)
//! to drain within a deadline.
//!
//! # Example
//!
//! ```rust
//! use rust_work_queue::dispatch::ChannelSource;
//! use rust_work_queue::{Job, PoolConfig, Result, ShutdownCoordinator, ShutdownState, WorkerPool};
//! use std::time::Duration;
//!
//! let pool = WorkerPool::with_config(PoolConfig::new(2), |_job: Job<u32>| -> Result<()> { Ok(()) })?;
//! let coordinator = ShutdownCoordinator::new(pool);
//!
//! let (tx, source) = ChannelSource::unbounded(Duration::from_secs(1));
//! coordinator.spawn_dispatcher(source, "dispatcher")?;
//! tx.send(1).unwrap();
//!
//! coordinator.signal().raise();
//! coordinator.wait_for_signal();
//! let report = coordinator.shutdown(Duration::from_secs(5))?;
//! assert_eq!(coordinator.state(), ShutdownState::Stopped);
//! assert!(report.dispatch.is_some());
//! # Ok::<(), rust_work_queue::PoolError>(())
//! ```

use crate::core::{PoolError, Result};
use crate::dispatch::{DispatchStats, Dispatcher, DispatcherHandle, JobSource};
use crate::pool::{ShutdownReport, WorkerPool};
use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Phases of a coordinated shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    /// Accepting and processing jobs
    Running = 0,
    /// Intake closed; queued and in-flight jobs are finishing
    Draining = 1,
    /// Workers have exited or were detached
    Stopped = 2,
}

impl ShutdownState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl std::fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

struct SignalInner {
    raised: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

/// One-way stop request shared between the coordinator, the dispatcher and
/// external triggers
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    /// Create a signal that is not raised
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                raised: AtomicBool::new(false),
                lock: Mutex::new(()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Raise the signal, waking every waiter
    ///
    /// Returns `true` for the call that raised it.
    pub fn raise(&self) -> bool {
        if self.inner.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        let _guard = self.inner.lock.lock();
        self.inner.condvar.notify_all();
        true
    }

    /// Returns `true` once the signal has been raised
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::Acquire)
    }

    /// Block until the signal is raised
    pub fn wait(&self) {
        let mut guard = self.inner.lock.lock();
        while !self.is_raised() {
            self.inner.condvar.wait(&mut guard);
        }
    }

    /// Block until the signal is raised or `timeout` elapses
    ///
    /// Returns `true` if the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut guard = self.inner.lock.lock();
        while !self.is_raised() {
            if self.inner.condvar.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_raised()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("raised", &self.is_raised())
            .finish()
    }
}

/// Owns a [`WorkerPool`] and stops it, together with its dispatcher thread
pub struct ShutdownCoordinator<R> {
    pool: WorkerPool<R>,
    signal: ShutdownSignal,
    state: AtomicU8,
    dispatcher: Mutex<Option<DispatcherHandle>>,
    /// Held for the whole of `shutdown`
    stopping: Mutex<()>,
}

impl<R> std::fmt::Debug for ShutdownCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("state", &self.state())
            .field("signal", &self.signal)
            .field("pool", &self.pool)
            .finish()
    }
}

impl<R> ShutdownCoordinator<R> {
    /// Take ownership of a running pool
    pub fn new(pool: WorkerPool<R>) -> Self {
        Self {
            pool,
            signal: ShutdownSignal::new(),
            state: AtomicU8::new(ShutdownState::Running as u8),
            dispatcher: Mutex::new(None),
            stopping: Mutex::new(()),
        }
    }

    /// A handle to the stop signal
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// The coordinated pool
    pub fn pool(&self) -> &WorkerPool<R> {
        &self.pool
    }

    /// Current phase
    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Register the dispatcher thread so shutdown can join it
    ///
    /// A previously attached handle is detached.
    pub fn attach_dispatcher(&self, handle: DispatcherHandle) {
        if let Some(previous) = self.dispatcher.lock().replace(handle) {
            warn!(
                "Replacing dispatcher '{}'; the previous one is detached",
                previous.name()
            );
        }
    }

    /// Block until some party raises the signal
    pub fn wait_for_signal(&self) {
        self.signal.wait();
    }

    /// Stop intake: raise the signal and close the queue
    ///
    /// Returns `true` on the `Running → Draining` transition, `false` if
    /// draining had already begun.
    pub fn begin_drain(&self) -> bool {
        if self
            .state
            .compare_exchange(
                ShutdownState::Running as u8,
                ShutdownState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        self.signal.raise();
        self.pool.queue().close();
        info!(
            "Draining: intake closed with {} queued and {} in flight",
            self.pool.queue_len(),
            self.pool.in_flight()
        );
        true
    }

    /// Drain and stop the pool within `timeout`, then join the dispatcher
    ///
    /// The coordinator is `Stopped` afterwards, also when the drain timed out.
    /// Concurrent callers are serialized: the first one drains, the others
    /// block until it is done and then get [`PoolError::NotRunning`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutdownTimedOut`] if workers were still busy at
    /// the deadline and [`PoolError::NotRunning`] if already stopped.
    pub fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport> {
        let _stopping = self.stopping.lock();
        if self.state() == ShutdownState::Stopped {
            return Err(PoolError::not_running(&self.pool.config().thread_name_prefix));
        }

        let start = Instant::now();
        self.begin_drain();

        let result = self.pool.shutdown(timeout);
        let dispatch = self.join_dispatcher(start.checked_add(timeout));

        self.state
            .store(ShutdownState::Stopped as u8, Ordering::Release);

        match result {
            Ok(mut report) => {
                report.dispatch = dispatch;
                report.elapsed_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Stopped after {}ms: {} processed, {} failed, {} timed out",
                    report.elapsed_ms,
                    report.stats.jobs_processed,
                    report.stats.jobs_failed,
                    report.stats.jobs_timed_out
                );
                Ok(report)
            }
            Err(e) => {
                error!("Shutdown incomplete: {}", e);
                Err(e)
            }
        }
    }

    /// Join the dispatcher if it finishes before `deadline`; detach it otherwise
    fn join_dispatcher(&self, deadline: Option<Instant>) -> Option<DispatchStats> {
        let handle = self.dispatcher.lock().take()?;

        let joined = match deadline {
            Some(deadline) => handle.join_deadline(deadline),
            None => Ok(handle.join()),
        };

        match joined {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(e @ PoolError::JoinError { .. })) => {
                error!("{}", e);
                None
            }
            Ok(Err(e)) => {
                warn!("Dispatcher exited with error: {}", e);
                None
            }
            Err(handle) => {
                warn!(
                    "Dispatcher '{}' did not stop in time, detaching it",
                    handle.name()
                );
                None
            }
        }
    }
}

impl<R> Drop for ShutdownCoordinator<R> {
    fn drop(&mut self) {
        // Stops an attached dispatcher; the pool drains in its own Drop
        self.signal.raise();
    }
}

impl<R: Send + 'static> ShutdownCoordinator<R> {
    /// Start a dispatcher from `source` into the pool's queue and attach it
    ///
    /// The dispatcher shares this coordinator's signal and uses the pool's
    /// configured poll interval.
    pub fn spawn_dispatcher<S>(&self, source: S, name: &str) -> Result<()>
    where
        S: JobSource<Resource = R> + 'static,
    {
        let handle = Dispatcher::new(source, Arc::clone(self.pool.queue()), self.signal())
            .with_poll_interval(self.pool.config().poll_interval)
            .spawn(name)?;
        self.attach_dispatcher(handle);
        Ok(())
    }
}
