//! Tracing integration for observability.
//!
//! Available with the `tracing` feature. Workers and jobs run inside
//! `tracing` spans, and the pool emits the [`metrics`] events below, which a
//! subscriber can turn into counters, gauges and histograms.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_work_queue::prelude::*;
//! use rust_work_queue::tracing::TracedHandler;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("rust_work_queue=debug".parse().unwrap()))
//!     .init();
//!
//! let handler = TracedHandler::new(StaticResponseHandler::new());
//! let pool = WorkerPool::with_config(PoolConfig::new(4), handler)?;
//! ```

use crate::core::{ConnectionHandler, Job, Result};
use std::time::Duration;

/// A handler wrapper that runs every job inside its own span
///
/// The span is a child of whatever span is current when the handler is
/// built, so jobs show up under the server's span in a trace.
pub struct TracedHandler<H> {
    inner: H,
    parent: tracing::Span,
}

impl<H> TracedHandler<H> {
    /// Wrap `inner`, capturing the current span as parent
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            parent: tracing::Span::current(),
        }
    }

    /// Wrap `inner` under a specific parent span
    pub fn with_span(inner: H, parent: tracing::Span) -> Self {
        Self { inner, parent }
    }
}

impl<R, H: ConnectionHandler<R>> ConnectionHandler<R> for TracedHandler<H> {
    fn process(&self, job: Job<R>) -> Result<()> {
        let span = tracing::debug_span!(
            parent: &self.parent,
            "handle_job",
            job_id = job.id().as_u64(),
            handler = self.inner.name(),
            budget_ms = job.remaining().as_millis() as u64,
        );
        let _guard = span.enter();
        self.inner.process(job)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Metrics recording functions for observability.
///
/// These functions emit tracing events that can be consumed by
/// metrics collection systems like Prometheus via tracing-opentelemetry.
pub mod metrics {
    use super::*;

    /// Records a job entering the queue.
    #[inline]
    pub fn record_submission(queue_depth: usize) {
        tracing::trace!(
            counter.jobs_submitted = 1,
            gauge.queue_depth = queue_depth as i64,
            "job submitted"
        );
    }

    /// Records a job the dispatcher dropped because the queue closed.
    #[inline]
    pub fn record_rejection() {
        tracing::trace!(counter.jobs_rejected = 1, "job rejected");
    }

    /// Records job completion with timing.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.jobs_completed = 1,
                histogram.job_duration_ms = duration_ms,
                "job completed successfully"
            );
        } else {
            tracing::trace!(
                counter.jobs_failed = 1,
                histogram.job_duration_ms = duration_ms,
                "job failed"
            );
        }
    }

    /// Records a job that missed its deadline; zero duration means it expired in the queue.
    #[inline]
    pub fn record_timeout(duration: Duration) {
        tracing::trace!(
            counter.jobs_timed_out = 1,
            histogram.job_duration_ms = duration.as_millis() as u64,
            "job timed out"
        );
    }

    /// Records a job panic event.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.jobs_panicked = 1,
            histogram.job_duration_ms = duration.as_millis() as u64,
            "job panicked"
        );
    }

    /// Records a queued job dropped after the pool was abandoned.
    #[inline]
    pub fn record_cancellation() {
        tracing::trace!(counter.jobs_cancelled = 1, "queued job dropped");
    }

    /// Records worker becoming busy.
    #[inline]
    pub fn record_worker_busy(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = 1,
            worker_id = worker_id,
            "worker busy"
        );
    }

    /// Records worker becoming idle.
    #[inline]
    pub fn record_worker_idle(worker_id: usize) {
        tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_id = worker_id,
            "worker idle"
        );
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(num_workers: usize, queue_capacity: usize) {
        tracing::info!(
            workers = num_workers,
            queue_capacity = queue_capacity,
            "worker pool started"
        );
    }

    /// Records pool shutdown.
    #[inline]
    pub fn record_pool_shutdown(jobs_processed: u64, jobs_failed: u64, jobs_timed_out: u64) {
        tracing::info!(
            jobs_processed = jobs_processed,
            jobs_failed = jobs_failed,
            jobs_timed_out = jobs_timed_out,
            "worker pool shutdown complete"
        );
    }
}
