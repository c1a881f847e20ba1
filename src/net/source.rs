//! TCP listener as a job source

use crate::core::Job;
use crate::dispatch::{AcceptError, JobSource};
use log::debug;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Accepts TCP connections and turns each into a [`Job<TcpStream>`]
///
/// The listener is put into non-blocking mode so the dispatcher can observe
/// its stop signal between accepts; accepted streams are switched back to
/// blocking mode before they are queued.
#[derive(Debug)]
pub struct TcpSource {
    listener: TcpListener,
    local_addr: SocketAddr,
    job_timeout: Duration,
}

impl TcpSource {
    /// Bind a listener; every accepted connection gets `job_timeout` to be served
    pub fn bind<A: ToSocketAddrs>(addr: A, job_timeout: Duration) -> io::Result<Self> {
        Self::from_listener(TcpListener::bind(addr)?, job_timeout)
    }

    /// Wrap an already bound listener
    pub fn from_listener(listener: TcpListener, job_timeout: Duration) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            job_timeout,
        })
    }

    /// The address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Per-connection time budget
    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }
}

/// Map a listener error onto the dispatcher's retry policy
fn classify(e: io::Error) -> AcceptError {
    match e.kind() {
        ErrorKind::WouldBlock => AcceptError::WouldBlock,
        ErrorKind::InvalidInput | ErrorKind::Unsupported | ErrorKind::PermissionDenied => {
            AcceptError::Fatal(e)
        }
        _ => AcceptError::Io(e),
    }
}

impl JobSource for TcpSource {
    type Resource = TcpStream;

    fn accept(&mut self) -> Result<Job<TcpStream>, AcceptError> {
        let (stream, peer) = self.listener.accept().map_err(classify)?;
        stream.set_nonblocking(false).map_err(AcceptError::Io)?;

        let job = Job::new(stream, self.job_timeout);
        debug!("Accepted connection from {} as {}", peer, job.id());
        Ok(job)
    }

    fn name(&self) -> &str {
        "TcpSource"
    }
}
