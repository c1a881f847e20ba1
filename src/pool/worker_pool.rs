//! Worker pool implementation

use crate::core::{CancellationReason, ConnectionHandler, Job, PoolError, Result};
use crate::dispatch::DispatchStats;
use crate::pool::config::PoolConfig;
use crate::pool::worker::{Activity, Worker, WorkerStatSnapshot, WorkerStats};
use crate::queue::{BoundedQueue, QueueError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time statistics of a whole pool
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PoolStats {
    /// Configured number of workers
    pub num_workers: usize,
    /// Worker threads that have not exited yet
    pub live_workers: usize,
    /// Jobs currently inside a handler
    pub in_flight: usize,
    /// Highest in-flight count observed
    pub peak_in_flight: usize,
    /// Jobs waiting in the queue
    pub queue_len: usize,
    /// Queue capacity
    pub queue_capacity: usize,
    /// Jobs submitted through [`WorkerPool::submit`] and [`WorkerPool::try_submit`]
    pub jobs_submitted: u64,
    /// Jobs completed successfully
    pub jobs_processed: u64,
    /// Jobs whose handler returned an error
    pub jobs_failed: u64,
    /// Jobs that missed their deadline
    pub jobs_timed_out: u64,
    /// Jobs whose handler panicked
    pub jobs_panicked: u64,
    /// Queued jobs dropped unhandled after a timed out shutdown
    pub jobs_cancelled: u64,
    /// Per-worker breakdown
    pub workers: Vec<WorkerStatSnapshot>,
}

/// Outcome of a completed shutdown
#[derive(Clone, Debug, Serialize)]
pub struct ShutdownReport {
    /// Jobs queued or in flight when the shutdown began
    pub pending_at_start: usize,
    /// Wall time the shutdown took, in milliseconds
    pub elapsed_ms: u64,
    /// Final pool statistics
    pub stats: PoolStats,
    /// Statistics of the attached dispatcher, if one was joined
    pub dispatch: Option<DispatchStats>,
}

/// A fixed-size pool of worker threads draining a shared [`BoundedQueue`]
///
/// Workers are spawned by the constructor and live until the queue is closed
/// and drained. Each worker runs the [`ConnectionHandler`] inline, one job at
/// a time, so at most `num_workers` jobs are ever in flight.
///
/// # Example
///
/// ```rust
/// use rust_work_queue::{BoundedQueue, Job, PoolConfig, Result, WorkerPool};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let queue = Arc::new(BoundedQueue::new(16));
/// let handler = |job: Job<u32>| -> Result<()> {
///     assert!(*job.resource() < 100);
///     Ok(())
/// };
/// let pool = WorkerPool::new(PoolConfig::new(2), Arc::clone(&queue), handler)?;
///
/// for n in 0..10 {
///     queue.send(Job::new(n, Duration::from_secs(1))).expect("queue open");
/// }
///
/// let report = pool.shutdown(Duration::from_secs(5))?;
/// assert_eq!(report.stats.jobs_processed, 10);
/// # Ok::<(), rust_work_queue::PoolError>(())
/// ```
pub struct WorkerPool<R> {
    config: PoolConfig,
    queue: Arc<BoundedQueue<Job<R>>>,
    workers: Mutex<Vec<Worker>>,
    worker_stats: Vec<Arc<WorkerStats>>,
    activity: Arc<Activity>,
    running: AtomicBool,
    jobs_submitted: AtomicU64,
}

impl<R> std::fmt::Debug for WorkerPool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("queue_len", &self.queue.len())
            .field("in_flight", &self.activity.in_flight())
            .finish()
    }
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Create a pool over an existing queue and start its workers
    ///
    /// `config.queue_capacity` is ignored; the queue's own capacity applies.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for an invalid configuration and
    /// [`PoolError::SpawnError`] if a worker thread cannot be spawned. In the
    /// latter case the queue is closed and already started workers are joined.
    pub fn new<H>(config: PoolConfig, queue: Arc<BoundedQueue<Job<R>>>, handler: H) -> Result<Self>
    where
        H: ConnectionHandler<R> + 'static,
    {
        config.validate()?;

        let handler: Arc<dyn ConnectionHandler<R>> = Arc::new(handler);
        let activity = Arc::new(Activity::new());

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            match Worker::new(
                id,
                &config.thread_name_prefix,
                Arc::clone(&queue),
                Arc::clone(&handler),
                Arc::clone(&activity),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    error!(
                        "Pool '{}': {}; stopping {} started workers",
                        config.thread_name_prefix,
                        e,
                        workers.len()
                    );
                    queue.close();
                    for worker in workers {
                        if let Err(join_err) = worker.join() {
                            warn!("{}", join_err);
                        }
                    }
                    return Err(e);
                }
            }
        }

        let worker_stats = workers.iter().map(Worker::stats).collect();

        info!(
            "Pool '{}' started: {} workers, queue capacity {}, {} handler",
            config.thread_name_prefix,
            config.num_workers,
            queue.capacity(),
            handler.name()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(config.num_workers, queue.capacity());

        Ok(Self {
            config,
            queue,
            workers: Mutex::new(workers),
            worker_stats,
            activity,
            running: AtomicBool::new(true),
            jobs_submitted: AtomicU64::new(0),
        })
    }

    /// Create a pool with its own queue of `config.queue_capacity` slots
    pub fn with_config<H>(config: PoolConfig, handler: H) -> Result<Self>
    where
        H: ConnectionHandler<R> + 'static,
    {
        config.validate()?;
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        Self::new(config, queue, handler)
    }

    /// Submit a job, blocking while the queue is full
    ///
    /// A job rejected because the pool is shutting down is dropped, which
    /// releases its resource.
    pub fn submit(&self, job: Job<R>) -> Result<()> {
        self.ensure_running()?;
        self.queue
            .send(job)
            .map_err(|e| e.into_pool_error(self.queue.capacity()))?;
        self.record_submission();
        Ok(())
    }

    /// Submit a job without blocking
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::QueueFull`] if the queue has no free slot.
    pub fn try_submit(&self, job: Job<R>) -> Result<()> {
        self.ensure_running()?;
        match self.queue.try_send(job) {
            Ok(()) => {
                self.record_submission();
                Ok(())
            }
            Err(QueueError::Full(_)) => Err(PoolError::queue_full(
                self.queue.len(),
                self.queue.capacity(),
            )),
            Err(e) => Err(e.into_pool_error(self.queue.capacity())),
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(PoolError::not_running(&self.config.thread_name_prefix))
        }
    }

    fn record_submission(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_submission(self.queue.len());
    }
}

impl<R> WorkerPool<R> {
    /// The shared job queue
    pub fn queue(&self) -> &Arc<BoundedQueue<Job<R>>> {
        &self.queue
    }

    /// The configuration the pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the number of worker threads
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Jobs currently being handled
    pub fn in_flight(&self) -> usize {
        self.activity.in_flight()
    }

    /// Highest number of jobs handled at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.activity.peak_in_flight()
    }

    /// Worker threads that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.activity.live_workers()
    }

    /// Check if the pool is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns `true` once a shutdown ran out of time and gave up on the workers
    pub fn is_abandoned(&self) -> bool {
        self.activity.is_abandoned()
    }

    /// Get current queue length (approximate)
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Get statistics for all workers
    pub fn stats(&self) -> Vec<Arc<WorkerStats>> {
        self.worker_stats.clone()
    }

    /// Get total jobs submitted through the pool
    pub fn total_jobs_submitted(&self) -> u64 {
        self.jobs_submitted.load(Ordering::Relaxed)
    }

    /// Get total jobs processed across all workers
    pub fn total_jobs_processed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_processed()).sum()
    }

    /// Get total jobs failed across all workers
    pub fn total_jobs_failed(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_failed()).sum()
    }

    /// Get total jobs timed out across all workers
    pub fn total_jobs_timed_out(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_timed_out()).sum()
    }

    /// Get total jobs panicked across all workers
    pub fn total_jobs_panicked(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_panicked()).sum()
    }

    /// Get total queued jobs dropped after the pool was abandoned
    pub fn total_jobs_cancelled(&self) -> u64 {
        self.worker_stats.iter().map(|s| s.get_jobs_cancelled()).sum()
    }

    /// Serializable snapshot of the pool's counters
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            num_workers: self.num_workers(),
            live_workers: self.live_workers(),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            queue_len: self.queue_len(),
            queue_capacity: self.queue.capacity(),
            jobs_submitted: self.total_jobs_submitted(),
            jobs_processed: self.total_jobs_processed(),
            jobs_failed: self.total_jobs_failed(),
            jobs_timed_out: self.total_jobs_timed_out(),
            jobs_panicked: self.total_jobs_panicked(),
            jobs_cancelled: self.total_jobs_cancelled(),
            workers: self
                .worker_stats
                .iter()
                .enumerate()
                .map(|(id, stats)| stats.snapshot(id))
                .collect(),
        }
    }

    /// Shutdown the pool, draining queued and in-flight jobs
    ///
    /// # Graceful Shutdown
    ///
    /// 1. Marks the pool stopped so `submit` fails with `NotRunning`
    /// 2. Closes the queue; blocked producers fail with `Closed`
    /// 3. Waits for workers to drain the queue and exit, up to `timeout`
    ///
    /// If the workers are still busy when `timeout` elapses, the pool is
    /// abandoned: every in-flight job's token is cancelled with
    /// [`CancellationReason::Shutdown`] and jobs still queued are dropped by the
    /// workers without reaching the handler. The remaining threads are detached
    /// and [`PoolError::ShutdownTimedOut`] is returned. The pool is stopped
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotRunning`] if the pool was already shut down and
    /// [`PoolError::WorkerPanic`] if a worker thread died outside a handler.
    pub fn shutdown(&self, timeout: Duration) -> Result<ShutdownReport> {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PoolError::not_running(&self.config.thread_name_prefix));
        }

        let start = Instant::now();
        let queued = self.queue.len();
        let in_flight = self.activity.in_flight();
        info!(
            "Pool '{}' shutting down: {} queued, {} in flight, {}ms budget",
            self.config.thread_name_prefix,
            queued,
            in_flight,
            timeout.as_millis()
        );

        self.queue.close();

        let drained = self.activity.wait_for_exit(start.checked_add(timeout));
        let workers = std::mem::take(&mut *self.workers.lock());

        if !drained {
            let cancelled = self.activity.abandon(CancellationReason::Shutdown);
            let live = self.activity.live_workers();
            warn!(
                "Pool '{}' did not drain within {}ms: cancelled {} in-flight jobs, dropping {} queued, detaching {} workers",
                self.config.thread_name_prefix,
                timeout.as_millis(),
                cancelled,
                self.queue.len(),
                live
            );
            // Finished workers are joined, stuck ones detach on drop
            drop(workers);
            return Err(PoolError::shutdown_timed_out(
                timeout.as_millis() as u64,
                cancelled,
                live,
            ));
        }

        let mut join_error = None;
        for worker in workers {
            if let Err(e) = worker.join() {
                error!("{}", e);
                join_error.get_or_insert(e);
            }
        }
        if let Some(e) = join_error {
            return Err(e);
        }

        let stats = self.snapshot();
        debug!(
            "Pool '{}' stopped after {}ms",
            self.config.thread_name_prefix,
            start.elapsed().as_millis()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_shutdown(
            stats.jobs_processed,
            stats.jobs_failed,
            stats.jobs_timed_out,
        );

        Ok(ShutdownReport {
            pending_at_start: queued + in_flight,
            elapsed_ms: start.elapsed().as_millis() as u64,
            stats,
            dispatch: None,
        })
    }
}

impl<R> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        // Only attempt shutdown if still running to avoid redundant work
        if self.is_running() {
            if let Err(e) = self.shutdown(self.config.shutdown_timeout) {
                error!(
                    "Failed to shutdown worker pool '{}' during drop: {}",
                    self.config.thread_name_prefix, e
                );
            }
        }
    }
}
