//! Producer side: job sources and the dispatcher loop feeding the queue

mod dispatcher;
mod source;

pub use dispatcher::{DispatchStats, Dispatcher, DispatcherHandle};
pub use source::{AcceptError, ChannelSource, JobSource};
