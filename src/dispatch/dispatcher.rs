//! The producer loop: accept from a source, enqueue into the pool's queue

use super::source::{AcceptError, JobSource};
use crate::core::error::panic_message;
use crate::core::{Job, PoolError, Result};
use crate::queue::BoundedQueue;
use crate::shutdown::ShutdownSignal;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use crossbeam_utils::Backoff;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counters of one dispatcher run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Jobs produced by the source
    pub accepted: u64,
    /// Jobs handed to the queue
    pub enqueued: u64,
    /// Jobs dropped because the queue closed while enqueueing
    pub rejected: u64,
    /// Transient accept errors
    pub accept_errors: u64,
    /// Polls that found nothing ready
    pub idle_polls: u64,
}

/// Pulls jobs from a [`JobSource`] and feeds them to a [`BoundedQueue`]
///
/// Enqueueing blocks while the queue is full, which pushes back on the source.
/// The loop ends when the [`ShutdownSignal`] is raised, the queue is closed,
/// or the source is exhausted.
///
/// # Example
///
/// ```rust
/// use rust_work_queue::dispatch::{ChannelSource, Dispatcher};
/// use rust_work_queue::{BoundedQueue, ShutdownSignal};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let queue = Arc::new(BoundedQueue::new(8));
/// let (tx, source) = ChannelSource::unbounded(Duration::from_secs(1));
/// for n in 0..3 {
///     tx.send(n).unwrap();
/// }
/// drop(tx);
///
/// let stats = Dispatcher::new(source, Arc::clone(&queue), ShutdownSignal::new()).run()?;
/// assert_eq!(stats.enqueued, 3);
/// assert_eq!(queue.len(), 3);
/// # Ok::<(), rust_work_queue::PoolError>(())
/// ```
pub struct Dispatcher<S: JobSource> {
    source: S,
    queue: Arc<BoundedQueue<Job<S::Resource>>>,
    signal: ShutdownSignal,
    poll_interval: Duration,
}

impl<S: JobSource> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("source", &self.source.name())
            .field("poll_interval", &self.poll_interval)
            .field("stopped", &self.signal.is_raised())
            .finish()
    }
}

impl<S: JobSource> Dispatcher<S> {
    /// Default idle poll interval
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Create a dispatcher
    pub fn new(
        source: S,
        queue: Arc<BoundedQueue<Job<S::Resource>>>,
        signal: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            queue,
            signal,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long to idle when the source has nothing ready
    ///
    /// # Panics
    ///
    /// Panics if interval is zero.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "poll interval must be non-zero");
        self.poll_interval = interval;
        self
    }

    /// Run the loop on the current thread until it stops
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Accept`] if the source reports a fatal error.
    pub fn run(mut self) -> Result<DispatchStats> {
        let mut stats = DispatchStats::default();
        let backoff = Backoff::new();
        let name = self.source.name().to_string();

        info!("Dispatcher started on {}", name);

        loop {
            if self.signal.is_raised() {
                debug!("Dispatcher: stop signal raised");
                break;
            }

            match self.source.accept() {
                Ok(job) => {
                    backoff.reset();
                    stats.accepted += 1;
                    let job_id = job.id();

                    match self.queue.send(job) {
                        Ok(()) => {
                            stats.enqueued += 1;
                            #[cfg(feature = "tracing")]
                            crate::tracing::metrics::record_submission(self.queue.len());
                        }
                        Err(err) => {
                            // The queue closed under us; dropping the job releases its resource
                            drop(err.into_inner());
                            stats.rejected += 1;
                            #[cfg(feature = "tracing")]
                            crate::tracing::metrics::record_rejection();
                            warn!("Dispatcher: queue closed, dropped {}", job_id);
                            break;
                        }
                    }
                }
                Err(AcceptError::WouldBlock) => {
                    stats.idle_polls += 1;
                    if backoff.is_completed() {
                        self.signal.wait_timeout(self.poll_interval);
                    } else {
                        backoff.snooze();
                    }
                }
                Err(AcceptError::Io(e)) => {
                    stats.accept_errors += 1;
                    warn!("Dispatcher: error accepting from {}: {}", name, e);
                    self.signal.wait_timeout(self.retry_delay());
                }
                Err(AcceptError::Exhausted) => {
                    debug!("Dispatcher: {} exhausted", name);
                    break;
                }
                Err(AcceptError::Fatal(e)) => {
                    error!(
                        "Dispatcher: fatal error on {} after {} jobs: {}",
                        name, stats.enqueued, e
                    );
                    return Err(PoolError::accept(e));
                }
            }
        }

        info!(
            "Dispatcher stopped: {} accepted, {} enqueued, {} rejected, {} accept errors",
            stats.accepted, stats.enqueued, stats.rejected, stats.accept_errors
        );
        Ok(stats)
    }

    /// Poll interval plus up to half of it again, so retries do not line up
    fn retry_delay(&self) -> Duration {
        let base_ms = self.poll_interval.as_millis() as u64;
        let jitter_ms = fastrand::u64(0..=base_ms / 2);
        self.poll_interval + Duration::from_millis(jitter_ms)
    }
}

impl<S: JobSource + 'static> Dispatcher<S> {
    /// Run the loop on a new named thread
    pub fn spawn(self, name: &str) -> Result<DispatcherHandle> {
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Dropped on every exit path, panics included
                let _done = done_tx;
                self.run()
            })
            .map_err(|e| {
                PoolError::other(format!("Failed to spawn dispatcher '{}': {}", name, e))
            })?;

        Ok(DispatcherHandle {
            name: name.to_string(),
            thread,
            done: done_rx,
        })
    }
}

/// A running dispatcher thread
///
/// The thread's exit disconnects `done`, so waiting for it with a deadline
/// needs no polling.
#[derive(Debug)]
pub struct DispatcherHandle {
    name: String,
    thread: thread::JoinHandle<Result<DispatchStats>>,
    done: Receiver<()>,
}

impl DispatcherHandle {
    /// Name of the dispatcher thread
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the dispatcher loop has returned
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the dispatcher to stop and return its statistics
    ///
    /// # Errors
    ///
    /// Returns the loop's own error, or [`PoolError::JoinError`] if the thread
    /// panicked.
    pub fn join(self) -> Result<DispatchStats> {
        let Self { name, thread, .. } = self;
        thread
            .join()
            .map_err(|payload| PoolError::join(name, panic_message(payload.as_ref())))?
    }

    /// Join if the dispatcher stops before `deadline`
    ///
    /// Hands the handle back unchanged when the deadline passes first.
    pub fn join_deadline(
        self,
        deadline: Instant,
    ) -> std::result::Result<Result<DispatchStats>, Self> {
        match self.done.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => Err(self),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Ok(self.join()),
        }
    }
}
