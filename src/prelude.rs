//! Convenient re-exports for common types and traits

pub use crate::core::{
    CancellationReason, CancellationToken, ConnectionHandler, Job, JobId, PoolError, Result,
};
pub use crate::dispatch::{
    AcceptError, ChannelSource, DispatchStats, Dispatcher, DispatcherHandle, JobSource,
};
pub use crate::net::{StaticResponseHandler, TcpSource};
pub use crate::pool::{PoolConfig, PoolStats, ShutdownReport, WorkerPool, WorkerStats};
pub use crate::queue::{BoundedQueue, QueueError};
pub use crate::shutdown::{ShutdownCoordinator, ShutdownSignal, ShutdownState};
