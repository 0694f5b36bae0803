//! Port service tests for freeact-posix

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use freeact_core::{Expiry, Port, Semaphore, ThreadSpec, Ticks, Timeout, Timer};
use freeact_posix::{interrupt, start_ticker, Posix, PosixSemaphore, PosixTimer};

fn leak_stack(size: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; size].into_boxed_slice())
}

#[test]
fn test_spawned_thread_is_woken_from_interrupt() {
    static SEM: std::sync::OnceLock<PosixSemaphore> = std::sync::OnceLock::new();
    static WAKEUPS: AtomicUsize = AtomicUsize::new(0);

    fn waiter(sem: &'static PosixSemaphore) -> ! {
        loop {
            if sem.take(Timeout::Forever) {
                WAKEUPS.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let sem = SEM.get_or_init(PosixSemaphore::new);
    let spec = ThreadSpec {
        name: "waiter",
        priority: 3,
        stack: leak_stack(1024),
    };
    Posix::spawn(spec, waiter, sem).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while WAKEUPS.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        interrupt(|isr| {
            assert!(Posix::in_interrupt());
            sem.give_from_isr();
            isr.switch_requested()
        });
        thread::sleep(Duration::from_millis(5));
    }
    assert!(WAKEUPS.load(Ordering::SeqCst) >= 1);
    assert!(!Posix::in_interrupt());
}

#[test]
fn test_periodic_timer_on_ticker() {
    static EXPIRIES: AtomicUsize = AtomicUsize::new(0);

    struct Counter;
    impl Expiry for Counter {
        fn expired(&'static self) {
            EXPIRIES.fetch_add(1, Ordering::SeqCst);
        }
    }
    static COUNTER: Counter = Counter;

    static TIMER: PosixTimer = PosixTimer::PERIODIC;

    start_ticker().unwrap();
    TIMER.start(Ticks(5), &COUNTER).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while EXPIRIES.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(EXPIRIES.load(Ordering::SeqCst) >= 3);
    assert!(TIMER.is_active());

    TIMER.stop().unwrap();
    assert!(!TIMER.is_active());
    thread::sleep(Duration::from_millis(20));
    let settled = EXPIRIES.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(EXPIRIES.load(Ordering::SeqCst), settled);
}
