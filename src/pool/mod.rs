//! Worker pool implementation

mod config;
mod worker;
mod worker_pool;

pub use config::PoolConfig;
pub use worker::{Worker, WorkerStatSnapshot, WorkerStats};
pub use worker_pool::{PoolStats, ShutdownReport, WorkerPool};
