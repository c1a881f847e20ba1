//! Worker thread implementation

use crate::core::error::panic_message;
use crate::core::{
    CancellationReason, CancellationToken, ConnectionHandler, Job, JobId, PoolError, Result,
};
use crate::queue::BoundedQueue;
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs whose handler returned `Ok` before the deadline
    pub jobs_processed: AtomicU64,
    /// Jobs whose handler returned a non-timeout error
    pub jobs_failed: AtomicU64,
    /// Jobs that hit their deadline, in the queue or in the handler
    pub jobs_timed_out: AtomicU64,
    /// Jobs whose handler panicked
    pub jobs_panicked: AtomicU64,
    /// Queued jobs dropped unhandled after the pool gave up on shutdown
    pub jobs_cancelled: AtomicU64,
    /// Total time spent inside handlers (microseconds)
    pub total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment jobs processed counter
    pub fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs failed counter
    pub fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs timed out counter
    pub fn increment_timed_out(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs panicked counter
    pub fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs cancelled counter
    pub fn increment_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Add processing time
    pub fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total jobs processed
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Get total jobs failed
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get total jobs timed out
    pub fn get_jobs_timed_out(&self) -> u64 {
        self.jobs_timed_out.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Get total queued jobs dropped without running
    pub fn get_jobs_cancelled(&self) -> u64 {
        self.jobs_cancelled.load(Ordering::Relaxed)
    }

    /// Get average handler time per handled job in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_processed()
            + self.get_jobs_failed()
            + self.get_jobs_timed_out()
            + self.get_jobs_panicked();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Take a serializable point-in-time copy
    pub fn snapshot(&self, worker_id: usize) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            worker_id,
            jobs_processed: self.get_jobs_processed(),
            jobs_failed: self.get_jobs_failed(),
            jobs_timed_out: self.get_jobs_timed_out(),
            jobs_panicked: self.get_jobs_panicked(),
            jobs_cancelled: self.get_jobs_cancelled(),
            average_processing_time_us: self.get_average_processing_time_us(),
        }
    }
}

/// Point-in-time statistics of one worker
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Worker ID
    pub worker_id: usize,
    /// Jobs completed successfully
    pub jobs_processed: u64,
    /// Jobs failed
    pub jobs_failed: u64,
    /// Jobs timed out
    pub jobs_timed_out: u64,
    /// Jobs panicked
    pub jobs_panicked: u64,
    /// Jobs dropped without running
    pub jobs_cancelled: u64,
    /// Average handler time in microseconds
    pub average_processing_time_us: f64,
}

/// How a single job ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Panicked,
    /// Dropped from the queue after the pool was abandoned
    Cancelled,
}

struct ActivityState {
    in_flight: HashMap<JobId, CancellationToken>,
    live_workers: usize,
    peak_in_flight: usize,
    abandoned: bool,
}

/// Pool-wide record of live workers and the jobs they are running
///
/// Shared by every worker of a pool. Shutdown parks on it until the last
/// worker exits. When it gives up, it abandons the pool: in-flight tokens are
/// cancelled and no further job is started.
pub(crate) struct Activity {
    state: Mutex<ActivityState>,
    workers_exited: Condvar,
}

impl Activity {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                in_flight: HashMap::new(),
                live_workers: 0,
                peak_in_flight: 0,
                abandoned: false,
            }),
            workers_exited: Condvar::new(),
        }
    }

    fn worker_started(&self) {
        self.state.lock().live_workers += 1;
    }

    fn worker_exited(&self) {
        let mut state = self.state.lock();
        state.live_workers = state.live_workers.saturating_sub(1);
        if state.live_workers == 0 {
            self.workers_exited.notify_all();
        }
    }

    /// Register a job as in flight, or `None` once the pool has been abandoned
    fn begin(&self, job_id: JobId, token: CancellationToken) -> Option<InFlightGuard<'_>> {
        let mut state = self.state.lock();
        if state.abandoned {
            return None;
        }
        state.in_flight.insert(job_id, token);
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight.len());
        Some(InFlightGuard {
            activity: self,
            job_id,
        })
    }

    fn finish(&self, job_id: JobId) {
        self.state.lock().in_flight.remove(&job_id);
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.state.lock().peak_in_flight
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.state.lock().live_workers
    }

    /// Wait until every worker has exited or `deadline` passes
    ///
    /// Returns `true` if all workers exited. `None` waits without bound.
    pub(crate) fn wait_for_exit(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        while state.live_workers > 0 {
            match deadline {
                Some(deadline) => {
                    if self
                        .workers_exited
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return state.live_workers == 0;
                    }
                }
                None => self.workers_exited.wait(&mut state),
            }
        }
        true
    }

    /// Stop starting jobs and cancel every in-flight token
    ///
    /// Returns how many in-flight jobs were cancelled. Jobs still queued are
    /// dropped by the workers without reaching the handler.
    pub(crate) fn abandon(&self, reason: CancellationReason) -> usize {
        let mut state = self.state.lock();
        state.abandoned = true;
        for token in state.in_flight.values() {
            token.cancel_with_reason(reason.clone());
        }
        state.in_flight.len()
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.state.lock().abandoned
    }
}

struct InFlightGuard<'a> {
    activity: &'a Activity,
    job_id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.activity.finish(self.job_id);
    }
}

/// Decrements the live worker count when the worker thread leaves `run`
struct ExitGuard {
    activity: Arc<Activity>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.activity.worker_exited();
    }
}

/// A worker thread that processes jobs from a queue
#[derive(Debug)]
pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Create and start a new worker
    ///
    /// The thread is named `{name_prefix}-{id}`. Workers exit when the queue
    /// is closed and empty, so every queued job is handled before shutdown
    /// completes.
    pub(crate) fn new<R: Send + 'static>(
        id: usize,
        name_prefix: &str,
        queue: Arc<BoundedQueue<Job<R>>>,
        handler: Arc<dyn ConnectionHandler<R>>,
        activity: Arc<Activity>,
    ) -> Result<Self> {
        let stats = Arc::new(WorkerStats::new());
        let stats_clone = Arc::clone(&stats);

        activity.worker_started();
        let activity_clone = Arc::clone(&activity);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", name_prefix, id))
            .spawn(move || {
                let _exit = ExitGuard {
                    activity: Arc::clone(&activity_clone),
                };
                Self::run(id, &queue, handler.as_ref(), &activity_clone, &stats_clone);
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                activity.worker_exited();
                return Err(PoolError::spawn_with_source(
                    id,
                    "failed to spawn worker thread",
                    e,
                ));
            }
        };

        Ok(Self {
            id,
            thread: Some(thread),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Returns `true` once the worker thread has left its loop
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Join the worker thread
    ///
    /// Handler panics are caught per job, so an error here means the thread
    /// died outside a handler.
    pub fn join(mut self) -> Result<()> {
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|payload| {
                PoolError::worker_panic(self.id, panic_message(payload.as_ref()))
            })?;
        }
        Ok(())
    }

    /// Main worker loop
    fn run<R>(
        id: usize,
        queue: &BoundedQueue<Job<R>>,
        handler: &dyn ConnectionHandler<R>,
        activity: &Activity,
        stats: &WorkerStats,
    ) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", id = id);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        debug!("Worker {} started ({})", id, handler.name());

        // recv only fails once the queue is closed and drained
        while let Ok(job) = queue.recv() {
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_busy(id);

            Self::execute_job(id, job, handler, activity, stats);

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_worker_idle(id);
        }

        debug!(
            "Worker {} shutting down: {} processed, {} failed, {} timed out, {} panicked, {} cancelled",
            id,
            stats.get_jobs_processed(),
            stats.get_jobs_failed(),
            stats.get_jobs_timed_out(),
            stats.get_jobs_panicked(),
            stats.get_jobs_cancelled()
        );
    }

    /// Execute a single job with panic protection and classify the outcome
    pub(crate) fn execute_job<R>(
        id: usize,
        job: Job<R>,
        handler: &dyn ConnectionHandler<R>,
        activity: &Activity,
        stats: &WorkerStats,
    ) -> JobOutcome {
        let job_id = job.id();
        let deadline = job.deadline();
        let budget_ms = job.timeout().as_millis() as u64;

        if job.is_expired() {
            warn!(
                "Worker {}: {} expired in the queue ({}ms budget), dropping it",
                id, job_id, budget_ms
            );
            drop(job);
            stats.increment_timed_out();
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_timeout(std::time::Duration::ZERO);
            return JobOutcome::TimedOut;
        }

        #[cfg(feature = "tracing")]
        let job_span = span!(Level::DEBUG, "job_execution", job_id = job_id.as_u64());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let Some(_in_flight) = activity.begin(job_id, job.token().clone()) else {
            debug!("Worker {}: pool abandoned, dropping queued {}", id, job_id);
            drop(job);
            stats.increment_cancelled();
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_cancellation();
            return JobOutcome::Cancelled;
        };
        let start = Instant::now();

        let panic_result = catch_unwind(AssertUnwindSafe(|| handler.process(job)));

        let elapsed = start.elapsed();
        let overran = Instant::now() > deadline;
        stats.add_processing_time(elapsed.as_micros() as u64);

        let outcome = match panic_result {
            Ok(Ok(())) if !overran => {
                debug!(
                    "Worker {}: {} completed in {}ms",
                    id,
                    job_id,
                    elapsed.as_millis()
                );
                JobOutcome::Succeeded
            }
            Ok(Ok(())) => {
                warn!(
                    "Worker {}: {} finished after its {}ms deadline",
                    id, job_id, budget_ms
                );
                JobOutcome::TimedOut
            }
            Ok(Err(e)) if overran || e.is_timeout() => {
                warn!("Worker {}: {} timed out: {}", id, job_id, e);
                JobOutcome::TimedOut
            }
            Ok(Err(e)) => {
                warn!("Worker {}: {} failed: {}", id, job_id, e);
                JobOutcome::Failed
            }
            Err(panic_info) => {
                let panic_msg = panic_message(panic_info.as_ref());
                error!("Worker {}: {} panicked: {}", id, job_id, panic_msg);
                JobOutcome::Panicked
            }
        };

        match outcome {
            JobOutcome::Succeeded => stats.increment_processed(),
            JobOutcome::Failed => stats.increment_failed(),
            JobOutcome::TimedOut => stats.increment_timed_out(),
            JobOutcome::Panicked => stats.increment_panicked(),
            JobOutcome::Cancelled => stats.increment_cancelled(),
        }

        #[cfg(feature = "tracing")]
        match outcome {
            JobOutcome::Succeeded => crate::tracing::metrics::record_completion(elapsed, true),
            JobOutcome::Failed => crate::tracing::metrics::record_completion(elapsed, false),
            JobOutcome::TimedOut => crate::tracing::metrics::record_timeout(elapsed),
            JobOutcome::Panicked => crate::tracing::metrics::record_panic(elapsed),
            JobOutcome::Cancelled => crate::tracing::metrics::record_cancellation(),
        }

        outcome
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if !thread.is_finished() {
                // Still stuck in a handler past the shutdown budget
                warn!("Worker {} still running, detaching its thread", self.id);
                return;
            }
            if let Err(payload) = thread.join() {
                let err = PoolError::worker_panic(self.id, panic_message(payload.as_ref()));
                error!("{}", err);
            }
        }
    }
}
