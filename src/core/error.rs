//! Error types for the work queue

use crate::core::cancellation::CancellationReason;
use crate::core::job::JobId;

/// Result type for work queue operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur in the work queue, the worker pool and the dispatcher
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Non-blocking enqueue rejected because the queue is at capacity
    #[error("Job queue is full: {current}/{capacity} jobs queued")]
    QueueFull {
        /// Queue occupancy when the job was rejected
        current: usize,
        /// Queue capacity
        capacity: usize,
    },

    /// The queue was closed; shutdown is in progress
    #[error("Job queue is closed")]
    QueueClosed,

    /// A handler reported a failure for a single job
    #[error("Job processing failed (job_id: {job_id}): {message}")]
    ProcessingError {
        /// ID of the failed job
        job_id: JobId,
        /// Error message
        message: String,
        /// Underlying I/O error, if any
        #[source]
        source: Option<std::io::Error>,
    },

    /// The job's deadline elapsed before the handler finished
    #[error("Job timeout after {timeout_ms}ms (job_id: {job_id})")]
    JobTimeout {
        /// ID of the timed out job
        job_id: JobId,
        /// Time budget the job had, in milliseconds
        timeout_ms: u64,
    },

    /// The job's cancellation token was triggered
    #[error("Job cancelled (job_id: {job_id}): {reason}")]
    Cancelled {
        /// ID of the cancelled job
        job_id: JobId,
        /// Why the token was cancelled
        reason: CancellationReason,
    },

    /// Draining did not complete within the shutdown deadline
    #[error(
        "Shutdown timed out after {timeout_ms}ms ({in_flight} jobs in flight, {live_workers} workers still running)"
    )]
    ShutdownTimedOut {
        /// Shutdown budget in milliseconds
        timeout_ms: u64,
        /// Jobs still being processed when the deadline elapsed
        in_flight: usize,
        /// Worker threads that had not exited
        live_workers: usize,
    },

    /// The pool or coordinator has already stopped
    #[error("Worker pool '{pool_name}' is not running")]
    NotRunning {
        /// Name of the worker pool
        pool_name: String,
    },

    /// Failed to spawn a worker thread
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// A dispatcher thread panicked and could not be joined cleanly
    #[error("Failed to join thread '{thread}': {message}")]
    JoinError {
        /// Name of the thread
        thread: String,
        /// Panic message
        message: String,
    },

    /// A worker thread panicked outside of job execution
    #[error("Worker thread #{thread_id} panicked: {message}")]
    WorkerPanic {
        /// ID of the panicked thread
        thread_id: usize,
        /// Panic message
        message: String,
    },

    /// The job source failed in a way the dispatcher cannot recover from
    #[error("Job source failed: {source}")]
    Accept {
        /// Source IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl PoolError {
    /// Create a queue full error
    pub fn queue_full(current: usize, capacity: usize) -> Self {
        PoolError::QueueFull { current, capacity }
    }

    /// Create a processing error
    pub fn processing(job_id: JobId, message: impl Into<String>) -> Self {
        PoolError::ProcessingError {
            job_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a processing error wrapping an I/O error
    pub fn processing_io(job_id: JobId, message: impl Into<String>, source: std::io::Error) -> Self {
        PoolError::ProcessingError {
            job_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a job timeout error
    pub fn job_timeout(job_id: JobId, timeout_ms: u64) -> Self {
        PoolError::JobTimeout { job_id, timeout_ms }
    }

    /// Create a cancelled error
    pub fn cancelled(job_id: JobId, reason: CancellationReason) -> Self {
        PoolError::Cancelled { job_id, reason }
    }

    /// Create a shutdown timeout error
    pub fn shutdown_timed_out(timeout_ms: u64, in_flight: usize, live_workers: usize) -> Self {
        PoolError::ShutdownTimedOut {
            timeout_ms,
            in_flight,
            live_workers,
        }
    }

    /// Create a not running error
    pub fn not_running(pool_name: impl Into<String>) -> Self {
        PoolError::NotRunning {
            pool_name: pool_name.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PoolError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::JoinError {
            thread: thread.into(),
            message: message.into(),
        }
    }

    /// Create a worker panic error
    pub fn worker_panic(thread_id: usize, message: impl Into<String>) -> Self {
        PoolError::WorkerPanic {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an accept error
    pub fn accept(source: std::io::Error) -> Self {
        PoolError::Accept { source }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        PoolError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PoolError::Other(msg.into())
    }

    /// Returns `true` if this error means the job ran out of time.
    ///
    /// Cancellations caused by an expired deadline count as timeouts too.
    pub fn is_timeout(&self) -> bool {
        match self {
            PoolError::JobTimeout { .. } => true,
            PoolError::Cancelled { reason, .. } => *reason == CancellationReason::Timeout,
            PoolError::ProcessingError {
                source: Some(io), ..
            } => matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Extracts a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PoolError::queue_full(100, 100);
        assert!(matches!(err, PoolError::QueueFull { .. }));

        let err = PoolError::processing(JobId::from_raw(123), "bad request");
        assert!(matches!(err, PoolError::ProcessingError { .. }));

        let err = PoolError::shutdown_timed_out(50, 1, 1);
        assert!(matches!(err, PoolError::ShutdownTimedOut { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::queue_full(2, 2);
        assert_eq!(err.to_string(), "Job queue is full: 2/2 jobs queued");

        let err = PoolError::job_timeout(JobId::from_raw(456), 5000);
        assert_eq!(err.to_string(), "Job timeout after 5000ms (job_id: job-456)");

        let err = PoolError::shutdown_timed_out(100, 3, 2);
        assert_eq!(
            err.to_string(),
            "Shutdown timed out after 100ms (3 jobs in flight, 2 workers still running)"
        );
    }

    #[test]
    fn test_processing_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = PoolError::processing_io(JobId::from_raw(5), "read failed", io_err);

        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("job-5"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_is_timeout() {
        assert!(PoolError::job_timeout(JobId::from_raw(1), 10).is_timeout());

        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline");
        assert!(PoolError::processing_io(JobId::from_raw(1), "read", io_err).is_timeout());

        assert!(PoolError::cancelled(JobId::from_raw(1), CancellationReason::Timeout).is_timeout());
        assert!(
            !PoolError::cancelled(JobId::from_raw(1), CancellationReason::Shutdown).is_timeout()
        );
        // A custom reason that merely reads like a timeout is not one
        assert!(!PoolError::cancelled(
            JobId::from_raw(1),
            CancellationReason::Custom("timeout requested by client".to_string())
        )
        .is_timeout());
        assert!(!PoolError::QueueClosed.is_timeout());
    }

    #[test]
    fn test_cancelled_display_uses_reason() {
        let err = PoolError::cancelled(JobId::from_raw(9), CancellationReason::Shutdown);
        assert_eq!(err.to_string(), "Job cancelled (job_id: job-9): pool shutting down");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
