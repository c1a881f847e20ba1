use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::Rng;
use rust_work_queue::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn benchmark_pool_creation(c: &mut Criterion) {
    c.bench_function("pool_creation", |b| {
        b.iter(|| {
            let pool = WorkerPool::with_config(PoolConfig::new(4), |_job: Job<u64>| -> Result<()> {
                Ok(())
            })
            .expect("Failed to create pool");
            pool.shutdown(Duration::from_secs(5))
                .expect("Failed to shutdown pool");
        });
    });
}

fn benchmark_queue_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_queue");

    group.bench_function("try_send_try_recv", |b| {
        let queue = BoundedQueue::new(1024);
        b.iter(|| {
            queue.try_send(black_box(42u64)).expect("Failed to enqueue");
            black_box(queue.try_recv().expect("Failed to dequeue"));
        });
    });

    group.bench_function("contended_1000", |b| {
        b.iter_batched(
            || Arc::new(BoundedQueue::new(16)),
            |queue| {
                let producers: Vec<_> = (0..4)
                    .map(|_| {
                        let queue = Arc::clone(&queue);
                        thread::spawn(move || {
                            for i in 0..250u64 {
                                queue.send(i).expect("Failed to enqueue");
                            }
                        })
                    })
                    .collect();

                let mut sum = 0u64;
                for _ in 0..1000 {
                    sum = sum.wrapping_add(queue.recv().expect("Failed to dequeue"));
                }
                for producer in producers {
                    producer.join().expect("Producer panicked");
                }
                black_box(sum);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_job_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_submission");

    group.bench_function("lightweight_jobs_100", |b| {
        b.iter_batched(
            || {
                WorkerPool::with_config(PoolConfig::new(4), |job: Job<u64>| -> Result<()> {
                    black_box(*job.resource() + 1);
                    Ok(())
                })
                .expect("Failed to create pool")
            },
            |pool| {
                for i in 0..100 {
                    pool.submit(Job::new(i, Duration::from_secs(10)))
                        .expect("Failed to submit job");
                }
                pool.shutdown(Duration::from_secs(10))
                    .expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });

    // Uneven work per job
    group.bench_function("mixed_jobs_100", |b| {
        b.iter_batched(
            || {
                let pool = WorkerPool::with_config(PoolConfig::new(4), |job: Job<u64>| -> Result<()> {
                    let mut sum = 0u64;
                    for i in 0..*job.resource() {
                        sum = sum.wrapping_add(i);
                    }
                    black_box(sum);
                    Ok(())
                })
                .expect("Failed to create pool");
                let mut rng = rand::thread_rng();
                let sizes: Vec<u64> = (0..100).map(|_| rng.gen_range(10..5000)).collect();
                (pool, sizes)
            },
            |(pool, sizes)| {
                for size in sizes {
                    pool.submit(Job::new(size, Duration::from_secs(10)))
                        .expect("Failed to submit job");
                }
                pool.shutdown(Duration::from_secs(10))
                    .expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("jobs_per_second", |b| {
        b.iter_batched(
            || {
                let counter = Arc::new(AtomicU64::new(0));
                let counter_clone = Arc::clone(&counter);
                let pool = WorkerPool::with_config(
                    PoolConfig::new(8).with_queue_capacity(256),
                    move |_job: Job<()>| -> Result<()> {
                        counter_clone.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    },
                )
                .expect("Failed to create pool");
                (pool, counter)
            },
            |(pool, counter)| {
                for _ in 0..1000 {
                    pool.submit(Job::new((), Duration::from_secs(10)))
                        .expect("Failed to submit job");
                }
                pool.shutdown(Duration::from_secs(10))
                    .expect("Failed to shutdown pool");

                let total = counter.load(Ordering::Relaxed);
                assert_eq!(total, 1000, "Not all jobs completed");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_backpressure(c: &mut Criterion) {
    c.bench_function("bounded_queue_pressure", |b| {
        b.iter_batched(
            || {
                WorkerPool::with_config(
                    PoolConfig::new(4).with_queue_capacity(100),
                    |_job: Job<()>| -> Result<()> {
                        thread::sleep(Duration::from_micros(100));
                        Ok(())
                    },
                )
                .expect("Failed to create pool")
            },
            |pool| {
                // More than the queue holds; the excess is rejected
                for _ in 0..150 {
                    let _ = pool.try_submit(Job::new((), Duration::from_secs(10)));
                }
                pool.shutdown(Duration::from_secs(10))
                    .expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    benchmark_pool_creation,
    benchmark_queue_operations,
    benchmark_job_submission,
    benchmark_throughput,
    benchmark_backpressure
);
criterion_main!(benches);
