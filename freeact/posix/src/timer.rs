//! Timer service and tick source.
//!
//! Timers count kernel ticks. The tick interrupt only advances the tick
//! count and wakes the timer daemon; the daemon thread runs the expiry
//! callbacks, so they execute in deferred thread context and never inside
//! the tick handler. The tick source is a drift-free host thread that
//! raises the tick "interrupt" at [`Posix::TICK_RATE_HZ`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use freeact_core::{Expiry, FaError, FaResult, Port, Ticks, Timer, TimerKind};
use log::{debug, error};
use parking_lot::{const_mutex, Condvar, Mutex};

use crate::thread::set_current_priority;
use crate::{isr, Posix, PosixError};

/// Priority of the timer daemon, above every active object
pub const TIMER_DAEMON_PRIORITY: u8 = u8::MAX;

/// Nanoseconds per second
const NSEC_PER_SEC: u64 = 1_000_000_000;

struct Slot {
    period: u64,
    /// Tick count at which the timer fires next
    deadline: u64,
    active: bool,
    target: Option<&'static dyn Expiry>,
}

struct TimerService {
    now: AtomicU64,
    timers: Mutex<Vec<&'static PosixTimer>>,
    tick_pending: Mutex<bool>,
    wake: Condvar,
    daemon_up: AtomicBool,
}

fn service() -> &'static TimerService {
    static SERVICE: OnceLock<TimerService> = OnceLock::new();
    static DAEMON: std::sync::Once = std::sync::Once::new();

    let service = SERVICE.get_or_init(|| TimerService {
        now: AtomicU64::new(0),
        timers: Mutex::new(Vec::new()),
        tick_pending: Mutex::new(false),
        wake: Condvar::new(),
        daemon_up: AtomicBool::new(false),
    });

    DAEMON.call_once(|| {
        let spawned = thread::Builder::new()
            .name("timer-daemon".into())
            .spawn(move || {
                set_current_priority(TIMER_DAEMON_PRIORITY);
                service.run();
            });
        match spawned {
            Ok(_) => service.daemon_up.store(true, Ordering::Release),
            Err(err) => error!("timer daemon creation failed: {}", err),
        }
    });
    service
}

impl TimerService {
    fn tick(&self) {
        self.now.fetch_add(1, Ordering::AcqRel);
        *self.tick_pending.lock() = true;
        self.wake.notify_one();
    }

    fn now(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }

    /// Put `timer` on the daemon's list the first time it starts
    fn register(&self, timer: &'static PosixTimer) -> FaResult<()> {
        if !self.daemon_up.load(Ordering::Acquire) {
            return Err(FaError::TimerCommand);
        }
        if !timer.registered.swap(true, Ordering::AcqRel) {
            self.timers.lock().push(timer);
        }
        Ok(())
    }

    fn run(&self) -> ! {
        let mut fired = Vec::new();
        loop {
            {
                let mut pending = self.tick_pending.lock();
                while !*pending {
                    self.wake.wait(&mut pending);
                }
                *pending = false;
            }

            let now = self.now();
            for timer in self.timers.lock().iter() {
                let mut slot = timer.slot.lock();
                if !slot.active || slot.deadline > now {
                    continue;
                }
                if timer.kind.is_periodic() {
                    slot.deadline += slot.period;
                } else {
                    slot.active = false;
                }
                fired.extend(slot.target);
            }

            for target in fired.drain(..) {
                target.expired();
            }
        }
    }
}

/// Kernel timer served by the timer daemon.
///
/// Dormant until its first start, which hands it to the daemon.
pub struct PosixTimer {
    kind: TimerKind,
    slot: Mutex<Slot>,
    registered: AtomicBool,
}

impl PosixTimer {
    const fn dormant(kind: TimerKind) -> Self {
        Self {
            kind,
            slot: const_mutex(Slot {
                period: 0,
                deadline: 0,
                active: false,
                target: None,
            }),
            registered: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    fn arm(&'static self, period: Ticks, target: &'static dyn Expiry) -> FaResult<()> {
        let service = service();
        service.register(self)?;

        let mut slot = self.slot.lock();
        slot.period = u64::from(period.raw());
        slot.deadline = service.now() + slot.period;
        slot.target = Some(target);
        slot.active = true;
        Ok(())
    }
}

impl Timer for PosixTimer {
    const ONE_SHOT: Self = Self::dormant(TimerKind::OneShot);
    const PERIODIC: Self = Self::dormant(TimerKind::Periodic);

    fn start(&'static self, period: Ticks, target: &'static dyn Expiry) -> FaResult<()> {
        self.arm(period, target)
    }

    fn start_from_isr(
        &'static self,
        period: Ticks,
        target: &'static dyn Expiry,
    ) -> FaResult<bool> {
        self.arm(period, target).map(|()| false)
    }

    fn stop(&self) -> FaResult<()> {
        self.slot.lock().active = false;
        Ok(())
    }

    fn stop_from_isr(&self) -> FaResult<bool> {
        self.stop().map(|()| false)
    }

    fn is_active(&self) -> bool {
        self.slot.lock().active
    }
}

/// Advance the timer service by one tick. Interrupt context.
pub(crate) fn tick() {
    service().tick();
}

/// Ticks elapsed since the timer service started
pub fn tick_count() -> u64 {
    service().now()
}

static TICKER_RUNNING: AtomicBool = AtomicBool::new(false);
static TICKER_THREAD: Mutex<Option<JoinHandle<()>>> = Mutex::new(None);

/// Period of one tick at the port's tick rate
pub fn tick_period() -> Duration {
    Duration::from_nanos(NSEC_PER_SEC / u64::from(Posix::TICK_RATE_HZ))
}

/// Start the tick source thread. Does nothing if it is already running.
pub fn start_ticker() -> Result<(), PosixError> {
    if TICKER_RUNNING.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let period = tick_period();
    let spawned = thread::Builder::new()
        .name("ticker".into())
        .spawn(move || ticker_thread(period));
    match spawned {
        Ok(handle) => {
            *TICKER_THREAD.lock() = Some(handle);
            debug!("ticker started, period {:?}", period);
            Ok(())
        }
        Err(err) => {
            TICKER_RUNNING.store(false, Ordering::SeqCst);
            Err(PosixError::Spawn(err))
        }
    }
}

/// Stop the tick source thread and wait for it to exit
pub fn stop_ticker() {
    TICKER_RUNNING.store(false, Ordering::SeqCst);

    let handle = TICKER_THREAD.lock().take();
    if let Some(handle) = handle {
        let _ = handle.join();
        debug!("ticker stopped");
    }
}

pub fn is_ticker_running() -> bool {
    TICKER_RUNNING.load(Ordering::SeqCst)
}

/// Sleeps until absolute tick times rather than for relative durations,
/// so the tick rate does not drift.
fn ticker_thread(period: Duration) {
    let mut next_tick = Instant::now();

    while TICKER_RUNNING.load(Ordering::Relaxed) {
        next_tick += period;

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }

        isr::interrupt(Posix::tick_from_isr);
    }
}
