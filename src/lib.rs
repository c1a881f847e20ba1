//! # Rust Work Queue
//!
//! A bounded job queue feeding a fixed pool of worker threads, with per-job
//! deadlines and a coordinated, deadline-bounded graceful shutdown.
//!
//! ## Features
//!
//! - **Bounded Queue**: Blocking and non-blocking FIFO queue with explicit close
//! - **Worker Pool**: Fixed number of named worker threads with panic isolation
//! - **Job Deadlines**: Every job carries a deadline-bound cancellation token
//! - **Dispatcher**: Producer loop pulling from any [`JobSource`](dispatch::JobSource)
//! - **Graceful Shutdown**: `Running → Draining → Stopped` with a drain deadline
//! - **TCP Server Parts**: Listener source and a reference connection handler
//! - **Worker Statistics**: Per-worker counters, serializable pool snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_work_queue::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::with_config(PoolConfig::new(4), |job: Job<String>| -> Result<()> {
//!     println!("{} handling {}", job.id(), job.resource());
//!     Ok(())
//! })?;
//!
//! for i in 0..10 {
//!     pool.submit(Job::new(format!("request {}", i), Duration::from_secs(1)))?;
//! }
//!
//! let report = pool.shutdown(Duration::from_secs(5))?;
//! assert_eq!(report.stats.jobs_processed, 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Bounded Queue
//!
//! ```rust
//! use rust_work_queue::prelude::*;
//!
//! let queue = BoundedQueue::new(2);
//! queue.enqueue("A", false).unwrap();
//! queue.enqueue("B", false).unwrap();
//! assert!(matches!(queue.enqueue("C", false), Err(QueueError::Full("C"))));
//!
//! assert_eq!(queue.dequeue().unwrap(), "A");
//! assert!(queue.close());
//! assert!(matches!(queue.enqueue("D", true), Err(QueueError::Closed("D"))));
//! assert_eq!(queue.dequeue().unwrap(), "B");
//! assert!(matches!(queue.dequeue(), Err(QueueError::Disconnected)));
//! ```
//!
//! ## Custom Handlers
//!
//! ```rust
//! use rust_work_queue::prelude::*;
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! impl ConnectionHandler<Vec<u8>> for Echo {
//!     fn process(&self, job: Job<Vec<u8>>) -> Result<()> {
//!         // Bail out if the deadline already passed
//!         job.check()?;
//!         println!("{} bytes", job.resource().len());
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Echo"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::with_config(PoolConfig::new(2), Echo)?;
//! pool.submit(Job::new(b"ping".to_vec(), Duration::from_secs(1)))?;
//! pool.shutdown(Duration::from_secs(5))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Worker Statistics
//!
//! ```rust
//! use rust_work_queue::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! # let pool = WorkerPool::with_config(PoolConfig::new(2), |_job: Job<()>| -> Result<()> { Ok(()) })?;
//! # for _ in 0..10 {
//! #     pool.submit(Job::new((), Duration::from_secs(1)))?;
//! # }
//! let report = pool.shutdown(Duration::from_secs(5))?;
//! for worker in &report.stats.workers {
//!     println!("Worker {}: {} jobs processed", worker.worker_id, worker.jobs_processed);
//! }
//!
//! println!("{}", serde_json::to_string_pretty(&report.stats).unwrap());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod dispatch;
pub mod net;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod shutdown;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use self::core::{
    CancellationReason, CancellationToken, ConnectionHandler, Job, JobId, PoolError, Result,
};
pub use dispatch::{AcceptError, DispatchStats, Dispatcher, DispatcherHandle, JobSource};
pub use pool::{PoolConfig, PoolStats, ShutdownReport, WorkerPool, WorkerStats};
pub use queue::{BoundedQueue, QueueError};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal, ShutdownState};
