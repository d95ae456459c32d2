/*!
 * Queue Benchmarks
 *
 * Compare the sharded queue against crossbeam's ArrayQueue and the
 * standard mpsc channel through the same public operations only.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_queue::ArrayQueue;
use shardq::{BlockingShardQueue, ShardQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn bench_uncontended_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_round_trip");
    group.throughput(Throughput::Elements(1));

    let queue = ShardQueue::new(1024).unwrap();
    group.bench_function("shardq_offer_poll", |b| {
        b.iter(|| {
            queue.offer(black_box(1u64)).ok();
            black_box(queue.poll());
        });
    });

    let crossbeam = ArrayQueue::new(1024);
    group.bench_function("crossbeam_push_pop", |b| {
        b.iter(|| {
            crossbeam.push(black_box(1u64)).ok();
            black_box(crossbeam.pop());
        });
    });

    let (sender, receiver) = std::sync::mpsc::channel();
    group.bench_function("std_mpsc_send_recv", |b| {
        b.iter(|| {
            sender.send(black_box(1u64)).ok();
            black_box(receiver.try_recv().ok());
        });
    });

    group.finish();
}

fn bench_mpmc_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_throughput");
    let per_producer = 10_000u64;

    for threads in [1usize, 2, 4] {
        group.throughput(Throughput::Elements(per_producer * threads as u64));

        group.bench_with_input(
            BenchmarkId::new("shardq", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(ShardQueue::new(4096).unwrap());
                    run_mpmc(
                        threads,
                        per_producer,
                        {
                            let queue = queue.clone();
                            move |value| {
                                let mut pending = value;
                                loop {
                                    match queue.offer(pending) {
                                        Ok(()) => break,
                                        Err(value) => {
                                            pending = value;
                                            thread::yield_now();
                                        }
                                    }
                                }
                            }
                        },
                        {
                            let queue = queue.clone();
                            move || queue.poll()
                        },
                    );
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(ArrayQueue::new(4096));
                    run_mpmc(
                        threads,
                        per_producer,
                        {
                            let queue = queue.clone();
                            move |value| {
                                let mut pending = value;
                                while let Err(value) = queue.push(pending) {
                                    pending = value;
                                    thread::yield_now();
                                }
                            }
                        },
                        {
                            let queue = queue.clone();
                            move || queue.pop()
                        },
                    );
                });
            },
        );
    }

    group.finish();
}

/// Spawn `threads` producers and `threads` consumers and move
/// `threads * per_producer` values through the given push/pop closures.
fn run_mpmc<P, C>(threads: usize, per_producer: u64, push: P, pop: C)
where
    P: Fn(u64) + Clone + Send + 'static,
    C: Fn() -> Option<u64> + Clone + Send + 'static,
{
    let total = per_producer * threads as u64;
    let done = Arc::new(AtomicBool::new(false));
    let consumed = Arc::new(std::sync::atomic::AtomicU64::new(0));

    let mut handles = Vec::new();
    for producer in 0..threads {
        let push = push.clone();
        handles.push(thread::spawn(move || {
            let base = producer as u64 * per_producer;
            for value in base..base + per_producer {
                push(value);
            }
        }));
    }
    for _ in 0..threads {
        let pop = pop.clone();
        let done = done.clone();
        let consumed = consumed.clone();
        handles.push(thread::spawn(move || loop {
            match pop() {
                Some(value) => {
                    black_box(value);
                    if consumed.fetch_add(1, Ordering::SeqCst) + 1 >= total {
                        done.store(true, Ordering::SeqCst);
                    }
                }
                None => {
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_drain_vs_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_vs_poll");
    let batch = 1024usize;
    group.throughput(Throughput::Elements(batch as u64));

    group.bench_function("poll_loop", |b| {
        let queue = BlockingShardQueue::new(batch).unwrap();
        b.iter(|| {
            for value in 0..batch {
                queue.put(value);
            }
            while let Some(value) = queue.poll() {
                black_box(value);
            }
        });
    });

    group.bench_function("drain_all", |b| {
        let queue = BlockingShardQueue::new(batch).unwrap();
        let mut sink = Vec::with_capacity(batch);
        b.iter(|| {
            for value in 0..batch {
                queue.put(value);
            }
            sink.clear();
            black_box(queue.drain_all_to(&mut sink));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_round_trip,
    bench_mpmc_throughput,
    bench_drain_vs_poll
);
criterion_main!(benches);
