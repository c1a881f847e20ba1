//! TCP server example
//!
//! Accepts connections on port 1729, hands each one to a pool of ten workers
//! and answers with a fixed HTTP response after simulated work. Press Enter
//! (or type `stop`) to begin a graceful shutdown.
//!
//! Run with: RUST_LOG=info cargo run --example tcp_server

use rust_work_queue::prelude::*;
use std::io::BufRead;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let config = PoolConfig::new(10)
        .with_queue_capacity(100)
        .with_job_timeout(Duration::from_secs(10))
        .with_thread_name_prefix("conn-worker");

    let source = TcpSource::bind("0.0.0.0:1729", config.job_timeout)
        .map_err(|e| PoolError::other(format!("Failed to bind: {}", e)))?;
    println!("Listening on {}", source.local_addr());

    let handler = StaticResponseHandler::new().with_work_time(Duration::from_secs(8));
    let shutdown_timeout = config.shutdown_timeout;
    let pool = WorkerPool::with_config(config, handler)?;

    let coordinator = ShutdownCoordinator::new(pool);
    coordinator.spawn_dispatcher(source, "acceptor")?;

    let signal = coordinator.signal();
    thread::Builder::new()
        .name("stdin-watcher".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if line.trim().is_empty() || line.trim() == "stop" => break,
                    Ok(_) => println!("Press Enter or type 'stop' to shut down"),
                    Err(_) => break,
                }
            }
            signal.raise();
        })
        .map_err(|e| PoolError::other(format!("Failed to spawn stdin watcher: {}", e)))?;

    println!("Press Enter or type 'stop' to shut down");
    coordinator.wait_for_signal();

    println!(
        "Draining {} queued and {} in-flight connections...",
        coordinator.pool().queue_len(),
        coordinator.pool().in_flight()
    );

    match coordinator.shutdown(shutdown_timeout) {
        Ok(report) => {
            println!("Stopped in {}ms", report.elapsed_ms);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("Failed to serialize report: {}", e),
            }
        }
        Err(e) => println!("Shutdown incomplete: {}", e),
    }

    Ok(())
}
