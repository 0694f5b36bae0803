use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use freeact_queue::EventQueue;

fn uncontended(c: &mut Criterion) {
    let queue: EventQueue<u64, 32> = EventQueue::new();
    let mut rx = queue.consumer().unwrap();

    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(1));
    group.bench_function("enqueue_dequeue", |b| {
        b.iter(|| {
            queue.enqueue(black_box(42)).unwrap();
            black_box(rx.dequeue())
        })
    });
    group.finish();
}

fn contended(c: &mut Criterion) {
    const BATCH: u64 = 10_000;
    const PRODUCERS: u64 = 3;

    let mut group = c.benchmark_group("contended");
    group.throughput(Throughput::Elements(BATCH * PRODUCERS));
    group.sample_size(20);
    group.bench_function("three_producers", |b| {
        b.iter(|| {
            let queue: Arc<EventQueue<u64, 64>> = Arc::new(EventQueue::new());
            let producers: Vec<_> = (0..PRODUCERS)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..BATCH {
                            while queue.enqueue(i).is_err() {
                                std::hint::spin_loop();
                            }
                        }
                    })
                })
                .collect();

            let mut rx = queue.consumer().unwrap();
            let mut received = 0;
            while received < BATCH * PRODUCERS {
                if rx.dequeue().is_some() {
                    received += 1;
                }
            }
            for p in producers {
                p.join().unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(benches, uncontended, contended);
criterion_main!(benches);
