//! Job sources the dispatcher pulls from

use crate::core::Job;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::io;
use std::time::Duration;

/// Why a [`JobSource::accept`] call produced no job
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    /// Nothing is ready right now; try again later
    #[error("no job ready")]
    WouldBlock,

    /// The source will never produce another job
    #[error("source exhausted")]
    Exhausted,

    /// Transient failure; the dispatcher logs it and keeps accepting
    #[error("transient accept error: {0}")]
    Io(#[source] io::Error),

    /// Unrecoverable failure; the dispatcher stops
    #[error("fatal accept error: {0}")]
    Fatal(#[source] io::Error),
}

/// A producer of jobs, polled by the [`Dispatcher`](super::Dispatcher)
///
/// `accept` must not block indefinitely: return [`AcceptError::WouldBlock`]
/// when nothing is ready so the dispatcher can observe its stop signal.
pub trait JobSource: Send {
    /// The resource each job carries
    type Resource: Send + 'static;

    /// Produce the next job
    fn accept(&mut self) -> Result<Job<Self::Resource>, AcceptError>;

    /// Source name for logging
    fn name(&self) -> &str {
        "JobSource"
    }
}

/// A [`JobSource`] fed through a crossbeam channel
///
/// Each received value becomes a job with `job_timeout` from the moment it is
/// accepted. Once every sender is dropped and the channel is empty the source
/// reports [`AcceptError::Exhausted`].
///
/// ```rust
/// use rust_work_queue::dispatch::{AcceptError, ChannelSource, JobSource};
/// use std::time::Duration;
///
/// let (tx, mut source) = ChannelSource::unbounded(Duration::from_secs(1));
/// tx.send("request").unwrap();
/// drop(tx);
///
/// let job = source.accept().unwrap();
/// assert_eq!(*job.resource(), "request");
/// assert!(matches!(source.accept(), Err(AcceptError::Exhausted)));
/// ```
#[derive(Debug)]
pub struct ChannelSource<R> {
    receiver: Receiver<R>,
    job_timeout: Duration,
}

impl<R> ChannelSource<R> {
    /// Wrap an existing receiver
    pub fn new(receiver: Receiver<R>, job_timeout: Duration) -> Self {
        Self {
            receiver,
            job_timeout,
        }
    }

    /// Create an unbounded channel and the source reading from it
    pub fn unbounded(job_timeout: Duration) -> (Sender<R>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self::new(rx, job_timeout))
    }

    /// Create a bounded channel and the source reading from it
    pub fn bounded(capacity: usize, job_timeout: Duration) -> (Sender<R>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (tx, Self::new(rx, job_timeout))
    }
}

impl<R: Send + 'static> JobSource for ChannelSource<R> {
    type Resource = R;

    fn accept(&mut self) -> Result<Job<R>, AcceptError> {
        match self.receiver.try_recv() {
            Ok(resource) => Ok(Job::new(resource, self.job_timeout)),
            Err(TryRecvError::Empty) => Err(AcceptError::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(AcceptError::Exhausted),
        }
    }

    fn name(&self) -> &str {
        "ChannelSource"
    }
}
