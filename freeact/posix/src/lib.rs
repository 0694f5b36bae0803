//! # FreeAct POSIX Port
//!
//! Hosts FreeAct active objects on Linux/Unix. Threads are `std` threads,
//! the wake-up semaphore is a `parking_lot` mutex and condition variable,
//! timers are served by a daemon thread, and interrupts are simulated by
//! running handlers through [`interrupt`].

use std::io;

use freeact_core::{FaResult, IsrContext, Port, ThreadSpec};
use thiserror::Error;

mod fault;
mod isr;
mod run;
mod semaphore;
mod thread;
mod timer;

pub use fault::{install_fault_hook, on_fault};
pub use isr::{in_interrupt, interrupt};
pub use run::{is_running, run, shutdown, RunConfig, RunConfigBuilder};
pub use semaphore::PosixSemaphore;
pub use thread::{current_priority, PosixThread, BACKGROUND_PRIORITY, MIN_STACK_SIZE};
pub use timer::{
    is_ticker_running, start_ticker, stop_ticker, tick_count, tick_period, PosixTimer,
    TIMER_DAEMON_PRIORITY,
};

/// Errors raised by host services
#[derive(Error, Debug)]
pub enum PosixError {
    #[error("failed to spawn host thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// The POSIX port
#[derive(Debug, Clone, Copy, Default)]
pub struct Posix;

impl Port for Posix {
    type Semaphore = PosixSemaphore;
    type Timer = PosixTimer;
    type Thread = PosixThread;

    const TICK_RATE_HZ: u32 = 1000;

    fn spawn<A: Sync + 'static>(
        spec: ThreadSpec,
        entry: fn(&'static A) -> !,
        arg: &'static A,
    ) -> FaResult<Self::Thread> {
        thread::spawn(spec, entry, arg)
    }

    fn in_interrupt() -> bool {
        isr::in_interrupt()
    }

    fn tick_from_isr(_ctx: &mut IsrContext) {
        timer::tick();
    }
}
