//! Core types and traits for the work queue

pub mod cancellation;
pub mod error;
pub mod job;

pub use cancellation::{CancellationReason, CancellationToken};
pub use error::{PoolError, Result};
pub use job::{ConnectionHandler, Job, JobId};
