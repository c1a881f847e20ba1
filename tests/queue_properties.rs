//! Property-based tests for the bounded queue and the pool using proptest

use proptest::prelude::*;
use rust_work_queue::prelude::*;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_capacity_two_scenario() {
    let queue = BoundedQueue::new(2);

    queue.enqueue("A", false).expect("Failed to enqueue A");
    queue.enqueue("B", false).expect("Failed to enqueue B");
    assert!(matches!(queue.enqueue("C", false), Err(QueueError::Full("C"))));

    assert_eq!(queue.dequeue().expect("Failed to dequeue"), "A");
    queue.enqueue("C", false).expect("Failed to enqueue C");
    assert_eq!(queue.dequeue().expect("Failed to dequeue"), "B");
    assert_eq!(queue.dequeue().expect("Failed to dequeue"), "C");
    assert!(matches!(queue.try_dequeue(), Err(QueueError::Empty)));
}

#[test]
fn test_full_enqueue_returns_immediately() {
    let queue = BoundedQueue::new(1);
    queue.try_send(1).expect("Failed to enqueue");

    let start = std::time::Instant::now();
    assert!(matches!(queue.enqueue(2, false), Err(QueueError::Full(2))));
    assert!(start.elapsed() < Duration::from_millis(100));
}

// ============================================================================
// Queue Model Tests
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    /// Non-blocking operations behave like a capacity-limited VecDeque
    #[test]
    fn test_matches_vecdeque_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 0..64)
    ) {
        let queue = BoundedQueue::new(capacity);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    let result = queue.try_send(value);
                    if model.len() < capacity {
                        prop_assert!(result.is_ok());
                        model.push_back(value);
                    } else {
                        prop_assert_eq!(result, Err(QueueError::Full(value)));
                    }
                }
                Op::Pop => match model.pop_front() {
                    Some(expected) => prop_assert_eq!(queue.try_recv(), Ok(expected)),
                    None => prop_assert_eq!(queue.try_recv(), Err(QueueError::Empty)),
                },
            }
            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_full(), model.len() == capacity);
        }
    }

    /// Closing keeps queued items deliverable, in order, then disconnects
    #[test]
    fn test_close_drains_in_order(values in prop::collection::vec(any::<i32>(), 0..16)) {
        let queue = BoundedQueue::new(16);
        for &value in &values {
            queue.send(value).expect("Failed to enqueue");
        }

        prop_assert!(queue.close());
        prop_assert!(!queue.close());
        prop_assert_eq!(queue.send(0), Err(QueueError::Closed(0)));

        for &value in &values {
            prop_assert_eq!(queue.dequeue(), Ok(value));
        }
        prop_assert_eq!(queue.dequeue(), Err(QueueError::Disconnected));
        prop_assert_eq!(queue.try_dequeue(), Err(QueueError::Disconnected));
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// N concurrent enqueues and M ≤ N concurrent dequeues leave N − M items,
    /// with no duplicates and nothing that was never enqueued
    #[test]
    fn test_concurrent_enqueue_dequeue(
        producers in 1usize..6,
        per_producer in 1usize..40,
        consumed_ratio in 0.0f64..=1.0
    ) {
        let total = producers * per_producer;
        let consumers = (total as f64 * consumed_ratio) as usize;
        let queue = Arc::new(BoundedQueue::new(total));

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.send(p * per_producer + i).expect("Failed to enqueue");
                    }
                })
            })
            .collect();

        let taken = Arc::new(Mutex::new(Vec::new()));
        let consumer_handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let taken = Arc::clone(&taken);
                thread::spawn(move || {
                    let item = queue.recv().expect("Failed to dequeue");
                    taken.lock().expect("Lock poisoned").push(item);
                })
            })
            .collect();

        for handle in producer_handles {
            handle.join().expect("Producer panicked");
        }
        for handle in consumer_handles {
            handle.join().expect("Consumer panicked");
        }

        prop_assert_eq!(queue.len(), total - consumers);

        queue.close();
        let mut seen: HashSet<usize> = taken.lock().expect("Lock poisoned").iter().copied().collect();
        prop_assert_eq!(seen.len(), consumers);
        while let Ok(item) = queue.try_recv() {
            prop_assert!(item < total);
            prop_assert!(seen.insert(item), "item {} delivered twice", item);
        }
        prop_assert_eq!(seen.len(), total);
    }
}

// ============================================================================
// Pool Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every submitted job is handled exactly once and in-flight never exceeds the worker count
    #[test]
    fn test_every_job_handled_once(workers in 1usize..6, job_count in 1usize..60) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let pool = WorkerPool::with_config(
            PoolConfig::new(workers).with_queue_capacity(8),
            move |job: Job<usize>| -> Result<()> {
                seen_clone.lock().expect("Lock poisoned").push(*job.resource());
                Ok(())
            },
        )
        .expect("Failed to create pool");

        for n in 0..job_count {
            pool.submit(Job::new(n, Duration::from_secs(10))).expect("Failed to submit job");
        }
        let report = pool.shutdown(Duration::from_secs(10)).expect("Failed to shutdown pool");

        let mut seen = seen.lock().expect("Lock poisoned").clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..job_count).collect::<Vec<_>>());
        prop_assert_eq!(report.stats.jobs_processed, job_count as u64);
        prop_assert!(report.stats.peak_in_flight <= workers);
    }

    /// Handler errors are counted and never stop the pool
    #[test]
    fn test_failures_counted(job_count in 1usize..40, fail_every in 2usize..5) {
        let handled = Arc::new(AtomicUsize::new(0));
        let handled_clone = Arc::clone(&handled);

        let pool = WorkerPool::with_config(
            PoolConfig::new(3),
            move |job: Job<usize>| -> Result<()> {
                handled_clone.fetch_add(1, Ordering::SeqCst);
                if *job.resource() % fail_every == 0 {
                    Err(PoolError::processing(job.id(), "rejected"))
                } else {
                    Ok(())
                }
            },
        )
        .expect("Failed to create pool");

        for n in 0..job_count {
            pool.submit(Job::new(n, Duration::from_secs(10))).expect("Failed to submit job");
        }
        let report = pool.shutdown(Duration::from_secs(10)).expect("Failed to shutdown pool");

        let expected_failures = (0..job_count).filter(|n| n % fail_every == 0).count() as u64;
        prop_assert_eq!(handled.load(Ordering::SeqCst), job_count);
        prop_assert_eq!(report.stats.jobs_failed, expected_failures);
        prop_assert_eq!(report.stats.jobs_processed, job_count as u64 - expected_failures);
    }
}
