//! TCP plumbing: a listener-backed [`JobSource`](crate::dispatch::JobSource)
//! and a reference [`ConnectionHandler`](crate::core::ConnectionHandler).
//!
//! Together with a [`WorkerPool`](crate::WorkerPool) and a
//! [`ShutdownCoordinator`](crate::ShutdownCoordinator) they make up a small
//! fixed-pool TCP server:
//!
//! ```rust,no_run
//! use rust_work_queue::net::{StaticResponseHandler, TcpSource};
//! use rust_work_queue::{PoolConfig, ShutdownCoordinator, WorkerPool};
//! use std::time::Duration;
//!
//! let config = PoolConfig::new(10).with_job_timeout(Duration::from_secs(10));
//! let source = TcpSource::bind("0.0.0.0:1729", config.job_timeout)?;
//! let pool = WorkerPool::with_config(config, StaticResponseHandler::new())?;
//!
//! let coordinator = ShutdownCoordinator::new(pool);
//! coordinator.spawn_dispatcher(source, "acceptor")?;
//! coordinator.wait_for_signal();
//! coordinator.shutdown(Duration::from_secs(30))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod handler;
mod source;

pub use handler::{StaticResponseHandler, DEFAULT_READ_BUFFER_SIZE, DEFAULT_RESPONSE};
pub use source::TcpSource;
