//! Reference connection handler: read a request, simulate work, write a fixed reply

use crate::core::{ConnectionHandler, Job, PoolError, Result};
use log::{debug, trace};
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Default reply
pub const DEFAULT_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\r\nhello world!\r\n";

/// Default read buffer size
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Serves every connection with the same response
///
/// Each step is bounded by the job's deadline: socket timeouts are set to the
/// remaining budget, and simulated work that would run past the deadline
/// ends the job with [`PoolError::JobTimeout`].
///
/// ```rust
/// use rust_work_queue::net::StaticResponseHandler;
/// use std::time::Duration;
///
/// let handler = StaticResponseHandler::new()
///     .with_work_time(Duration::from_millis(5))
///     .with_response("HTTP/1.1 204 No Content\r\n\r\n");
/// assert_eq!(handler.read_buffer_size(), 1024);
/// ```
#[derive(Clone, Debug)]
pub struct StaticResponseHandler {
    response: Vec<u8>,
    read_buffer_size: usize,
    work_time: Duration,
}

impl Default for StaticResponseHandler {
    fn default() -> Self {
        Self {
            response: DEFAULT_RESPONSE.to_vec(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            work_time: Duration::ZERO,
        }
    }
}

impl StaticResponseHandler {
    /// Handler with the default response, a 1024 byte buffer and no simulated work
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reply bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_response<B: Into<Vec<u8>>>(mut self, response: B) -> Self {
        self.response = response.into();
        self
    }

    /// Set how many request bytes to read
    ///
    /// # Panics
    ///
    /// Panics if size is 0.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        assert!(size > 0, "read buffer size must be greater than 0");
        self.read_buffer_size = size;
        self
    }

    /// Set how long to pretend to work between reading and replying
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_work_time(mut self, work_time: Duration) -> Self {
        self.work_time = work_time;
        self
    }

    /// Read buffer size
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Simulated work time
    pub fn work_time(&self) -> Duration {
        self.work_time
    }

    /// The remaining budget, or a timeout error once it is spent
    fn budget(job: &Job<TcpStream>) -> Result<Duration> {
        let remaining = job.remaining();
        if remaining.is_zero() {
            Err(Self::timeout(job))
        } else {
            Ok(remaining)
        }
    }

    fn timeout(job: &Job<TcpStream>) -> PoolError {
        PoolError::job_timeout(job.id(), job.timeout().as_millis() as u64)
    }

    fn io_error(job: &Job<TcpStream>, step: &str, e: io::Error) -> PoolError {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Self::timeout(job),
            _ => PoolError::processing_io(job.id(), format!("{} failed", step), e),
        }
    }
}

impl ConnectionHandler<TcpStream> for StaticResponseHandler {
    fn process(&self, job: Job<TcpStream>) -> Result<()> {
        let mut stream = job.resource();

        stream
            .set_read_timeout(Some(Self::budget(&job)?))
            .map_err(|e| Self::io_error(&job, "set_read_timeout", e))?;

        let mut buffer = vec![0u8; self.read_buffer_size];
        let read = stream
            .read(&mut buffer)
            .map_err(|e| Self::io_error(&job, "read", e))?;
        if read == 0 {
            debug!("{}: peer closed without sending", job.id());
            return Ok(());
        }
        trace!("{}: read {} bytes", job.id(), read);

        if !self.work_time.is_zero() {
            if self.work_time > job.remaining() {
                // Work would overrun: hold the connection until the deadline, then give up
                job.token().wait_timeout(job.remaining());
                job.check()?;
                return Err(Self::timeout(&job));
            }
            if job.token().wait_timeout(self.work_time) {
                job.check()?;
            }
        }

        stream
            .set_write_timeout(Some(Self::budget(&job)?))
            .map_err(|e| Self::io_error(&job, "set_write_timeout", e))?;
        stream
            .write_all(&self.response)
            .and_then(|()| stream.flush())
            .map_err(|e| Self::io_error(&job, "write", e))?;

        debug!("{}: replied with {} bytes", job.id(), self.response.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "StaticResponseHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    /// A connected (server side, client side) pair on an ephemeral port
    fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        let client =
            TcpStream::connect(listener.local_addr().expect("Failed to get addr"))
                .expect("Failed to connect");
        let (server, _) = listener.accept().expect("Failed to accept");
        (server, client)
    }

    #[test]
    fn test_replies_after_request() {
        let (server, mut client) = socket_pair();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").expect("Failed to write");

        let handler = StaticResponseHandler::new();
        handler
            .process(Job::new(server, Duration::from_secs(5)))
            .expect("Handler failed");

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).expect("Failed to read reply");
        assert_eq!(reply, DEFAULT_RESPONSE);
    }

    #[test]
    fn test_peer_closing_without_data_is_ok() {
        let (server, client) = socket_pair();
        drop(client);

        let handler = StaticResponseHandler::new();
        assert!(handler
            .process(Job::new(server, Duration::from_secs(5)))
            .is_ok());
    }

    #[test]
    fn test_silent_peer_times_out() {
        let (server, _client) = socket_pair();

        let handler = StaticResponseHandler::new();
        let result = handler.process(Job::new(server, Duration::from_millis(30)));
        assert!(matches!(result, Err(PoolError::JobTimeout { .. })));
    }

    #[test]
    fn test_work_past_deadline_times_out() {
        let (server, mut client) = socket_pair();
        client.write_all(b"ping").expect("Failed to write");

        let handler = StaticResponseHandler::new().with_work_time(Duration::from_secs(10));
        let start = std::time::Instant::now();
        let result = handler.process(Job::new(server, Duration::from_millis(50)));

        assert!(result.as_ref().is_err_and(PoolError::is_timeout));
        assert!(start.elapsed() < Duration::from_secs(5));

        // Nothing was written before the connection closed
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).expect("Failed to read");
        assert!(reply.is_empty());
    }

    #[test]
    fn test_custom_response_with_work() {
        let (server, mut client) = socket_pair();
        let reader = thread::spawn(move || {
            client.write_all(b"hello").expect("Failed to write");
            let mut reply = Vec::new();
            client.read_to_end(&mut reply).expect("Failed to read");
            reply
        });

        let handler = StaticResponseHandler::new()
            .with_response("pong")
            .with_read_buffer_size(16)
            .with_work_time(Duration::from_millis(10));
        handler
            .process(Job::new(server, Duration::from_secs(5)))
            .expect("Handler failed");

        assert_eq!(reader.join().expect("Reader panicked"), b"pong");
    }
}
