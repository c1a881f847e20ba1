//! Bounded queue example
//!
//! Demonstrates queue capacity limits, backpressure and per-job deadlines.
//!
//! Run with: cargo run --example bounded_queue

use rust_work_queue::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Work Queue - Bounded Queue Example ===\n");

    println!("1. Queue on its own:");
    let queue = BoundedQueue::new(2);
    queue.enqueue("A", false)?;
    queue.enqueue("B", false)?;
    match queue.enqueue("C", false) {
        Err(QueueError::Full(item)) => println!("   '{}' rejected, queue is full", item),
        other => println!("   unexpected: {:?}", other),
    }
    println!("   dequeued '{}'", queue.dequeue()?);
    queue.enqueue("C", false)?;
    queue.close();
    while let Ok(item) = queue.dequeue() {
        println!("   drained '{}' after close", item);
    }

    // Two slow workers behind a queue of five
    let config = PoolConfig::new(2)
        .with_queue_capacity(5)
        .with_thread_name_prefix("bounded-worker");

    let pool = WorkerPool::with_config(config, |job: Job<usize>| -> Result<()> {
        println!("   Job {} is executing", job.resource());
        if job.token().wait_timeout(Duration::from_millis(200)) {
            return job.check();
        }
        Ok(())
    })?;

    println!("\n2. Configuration:");
    println!("   Worker threads: {}", pool.num_workers());
    println!("   Queue capacity: {}", pool.config().queue_capacity);

    println!("\n3. Submitting without blocking:");
    let accepted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    for i in 0..20 {
        match pool.try_submit(Job::new(i, Duration::from_secs(5))) {
            Ok(()) => {
                accepted.fetch_add(1, Ordering::Relaxed);
                println!("   Job {} accepted", i);
            }
            Err(PoolError::QueueFull { current, capacity }) => {
                rejected.fetch_add(1, Ordering::Relaxed);
                println!("   Job {} rejected ({}/{})", i, current, capacity);
            }
            Err(e) => println!("   Job {} error: {}", i, e),
        }
        thread::sleep(Duration::from_millis(10));
    }

    println!(
        "\n4. Submission results: {} accepted, {} rejected",
        accepted.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed)
    );

    println!("\n5. Blocking submit waits for space:");
    for i in 100..103 {
        pool.submit(Job::new(i, Duration::from_secs(5)))?;
        println!("   Job {} accepted", i);
    }

    println!("\n6. A job whose deadline passes while queued:");
    pool.submit(Job::new(999, Duration::from_millis(1)))?;

    let report = pool.shutdown(Duration::from_secs(10))?;

    println!("\n7. Final statistics:");
    println!("   Total submitted: {}", report.stats.jobs_submitted);
    println!("   Total processed: {}", report.stats.jobs_processed);
    println!("   Total timed out: {}", report.stats.jobs_timed_out);
    println!("   Peak in flight:  {}", report.stats.peak_in_flight);

    println!("\n=== Example completed successfully! ===");
    println!("Note: Bounded queues keep memory flat and push back on producers under load");

    Ok(())
}
