//! Job type and the connection handler boundary

use crate::core::cancellation::CancellationToken;
use crate::core::error::{PoolError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier, used for logging and metrics only
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

impl JobId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value (tests and external id schemes)
    pub const fn from_raw(raw: u64) -> Self {
        JobId(raw)
    }

    /// The raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// A unit of work: a resource handle plus the deadline it must be processed by
///
/// The job owns its resource. Whoever holds the job last (the handler, the
/// worker skipping an expired job, or the dispatcher when the queue rejects
/// it) drops it, which releases the resource exactly once.
pub struct Job<R> {
    id: JobId,
    accepted_at: Instant,
    deadline: Instant,
    token: CancellationToken,
    resource: R,
}

impl<R> Job<R> {
    /// Create a job that must finish within `timeout` from now
    pub fn new(resource: R, timeout: Duration) -> Self {
        let accepted_at = Instant::now();
        // Saturate absurd timeouts instead of overflowing
        let deadline = accepted_at
            .checked_add(timeout)
            .unwrap_or_else(|| accepted_at + Duration::from_secs(60 * 60 * 24 * 365));
        Self::build(JobId::next(), accepted_at, deadline, resource)
    }

    /// Create a job with an absolute deadline
    pub fn with_deadline(resource: R, deadline: Instant) -> Self {
        Self::build(JobId::next(), Instant::now(), deadline, resource)
    }

    fn build(id: JobId, accepted_at: Instant, deadline: Instant, resource: R) -> Self {
        Self {
            id,
            accepted_at,
            deadline,
            token: CancellationToken::with_deadline(deadline),
            resource,
        }
    }

    /// Job identifier
    pub fn id(&self) -> JobId {
        self.id
    }

    /// When the job was created (accepted from its source)
    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// Absolute deadline after which processing must abort
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The total time budget between acceptance and deadline
    pub fn timeout(&self) -> Duration {
        self.deadline.saturating_duration_since(self.accepted_at)
    }

    /// Time left until the deadline (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once the deadline has passed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// The job's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns an error if the job was cancelled or its deadline passed
    ///
    /// Handlers call this between blocking steps and bail out with `?`.
    pub fn check(&self) -> Result<()> {
        match self.token.reason() {
            None => Ok(()),
            Some(crate::core::CancellationReason::Timeout) => Err(PoolError::job_timeout(
                self.id,
                self.timeout().as_millis() as u64,
            )),
            Some(reason) => Err(PoolError::cancelled(self.id, reason)),
        }
    }

    /// Borrow the resource
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Mutably borrow the resource
    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    /// Consume the job and take the resource out
    pub fn into_resource(self) -> R {
        self.resource
    }
}

impl<R> fmt::Debug for Job<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("remaining", &self.remaining())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Processes one job: read, process, write, report
///
/// Implementations must bound their own blocking I/O by
/// [`Job::remaining()`], since the pool never preempts a running handler.
/// Taking the job by value means its resource is released when `process`
/// returns, on success and on every error path.
pub trait ConnectionHandler<R>: Send + Sync {
    /// Process the job
    ///
    /// # Errors
    ///
    /// Returns an error if processing fails; [`PoolError::JobTimeout`] when
    /// the deadline ran out.
    fn process(&self, job: Job<R>) -> Result<()>;

    /// Handler name for logging
    fn name(&self) -> &str {
        "ConnectionHandler"
    }
}

impl<R, F> ConnectionHandler<R> for F
where
    F: Fn(Job<R>) -> Result<()> + Send + Sync,
{
    fn process(&self, job: Job<R>) -> Result<()> {
        self(job)
    }

    fn name(&self) -> &str {
        "ClosureHandler"
    }
}
