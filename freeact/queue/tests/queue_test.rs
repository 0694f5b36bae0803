//! Event queue tests for freeact-queue
//! Producers run on std threads standing in for tasks and interrupt handlers

use std::sync::{Arc, Barrier};
use std::thread;

use freeact_queue::{EventQueue, QueueFull};

#[test]
fn test_capacity_two_scenario() {
    let queue: EventQueue<char, 2> = EventQueue::new();
    let mut rx = queue.consumer().unwrap();

    assert!(queue.enqueue('A').is_ok());
    assert!(queue.enqueue('B').is_ok());
    assert_eq!(queue.enqueue('C'), Err(QueueFull('C')));
    assert_eq!(rx.dequeue(), Some('A'));
    assert!(queue.enqueue('C').is_ok());
    assert_eq!(rx.dequeue(), Some('B'));
    assert_eq!(rx.dequeue(), Some('C'));
    assert_eq!(rx.dequeue(), None);
}

#[test]
fn test_bounded_capacity() {
    const N: usize = 8;
    let queue: EventQueue<usize, N> = EventQueue::new();
    let mut rx = queue.consumer().unwrap();

    for i in 0..N {
        queue.enqueue(i).unwrap();
    }
    assert_eq!(queue.enqueue(N).unwrap_err().into_inner(), N);

    assert_eq!(rx.dequeue(), Some(0));
    assert!(queue.enqueue(N).is_ok());
    assert!(queue.enqueue(N + 1).is_err());

    let stats = queue.stats();
    assert_eq!(stats.free, 0);
    assert!(stats.has_overflowed());
    assert_eq!(stats.peak_utilization(), 100);
}

#[test]
fn test_statics_are_const_constructed() {
    static QUEUE: EventQueue<u16, 4> = EventQueue::new();

    let mut rx = QUEUE.consumer().unwrap();
    QUEUE.enqueue(7).unwrap();
    assert_eq!(rx.dequeue(), Some(7));
}

const PRODUCERS: usize = 4;
const PER_PRODUCER: u32 = 20_000;

/// Drain concurrently with `PRODUCERS` threads that retry on full.
fn run_contended<const N: usize>() -> Vec<Vec<u32>> {
    let queue: Arc<EventQueue<(usize, u32), N>> = Arc::new(EventQueue::new());
    let start = Arc::new(Barrier::new(PRODUCERS + 1));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for seq in 0..PER_PRODUCER {
                    let mut item = (id, seq);
                    while let Err(QueueFull(back)) = queue.enqueue(item) {
                        item = back;
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let mut rx = queue.consumer().unwrap();
    let mut seen = vec![Vec::new(); PRODUCERS];
    let total = PRODUCERS * PER_PRODUCER as usize;
    let mut received = 0;

    start.wait();
    while received < total {
        match rx.dequeue() {
            Some((id, seq)) => {
                seen[id].push(seq);
                received += 1;
            }
            None => thread::yield_now(),
        }
    }

    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(rx.dequeue(), None);
    seen
}

#[test]
fn test_no_loss_no_duplication_per_producer_fifo() {
    let seen = run_contended::<64>();
    let expected: Vec<u32> = (0..PER_PRODUCER).collect();
    for per_producer in seen {
        assert_eq!(per_producer, expected);
    }
}

#[test]
fn test_no_aliasing_near_exhaustion() {
    // A tiny pool keeps producers racing for the last free nodes; a node
    // handed out twice would lose or duplicate an item.
    let seen = run_contended::<2>();
    let expected: Vec<u32> = (0..PER_PRODUCER).collect();
    for per_producer in seen {
        assert_eq!(per_producer, expected);
    }
}

#[test]
fn test_in_flight_never_exceeds_capacity() {
    const N: usize = 16;
    let queue: Arc<EventQueue<u32, N>> = Arc::new(EventQueue::new());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || (0..N as u32).filter(|&i| queue.enqueue(i).is_ok()).count())
        })
        .collect();
    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(accepted, N);
    assert_eq!(queue.len(), N);

    let mut rx = queue.consumer().unwrap();
    let mut drained = 0;
    while rx.dequeue().is_some() {
        drained += 1;
    }
    assert_eq!(drained, N);
    assert!(queue.is_empty());
}
