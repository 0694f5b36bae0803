//! Binary semaphore an active object's thread sleeps on

use std::time::Instant;

use freeact_core::{Port, Semaphore, Timeout};
use parking_lot::{Condvar, Mutex};

use crate::thread::current_priority;
use crate::Posix;

#[derive(Debug, Default)]
struct State {
    given: bool,
    /// Priority of the thread blocked in `take`, if any
    waiter: Option<u8>,
}

/// Binary semaphore on a mutex and condition variable.
///
/// Gives while already given collapse into one.
#[derive(Debug, Default)]
pub struct PosixSemaphore {
    state: Mutex<State>,
    ready: Condvar,
}

impl PosixSemaphore {
    fn release(&self) -> Option<u8> {
        let mut state = self.state.lock();
        state.given = true;
        let waiter = state.waiter;
        drop(state);

        self.ready.notify_one();
        waiter
    }
}

impl Semaphore for PosixSemaphore {
    fn new() -> Self {
        Self::default()
    }

    fn take(&self, timeout: Timeout) -> bool {
        let mut state = self.state.lock();

        match timeout {
            Timeout::NoWait => {}
            Timeout::Forever => {
                while !state.given {
                    state.waiter = Some(current_priority());
                    self.ready.wait(&mut state);
                }
            }
            Timeout::Ticks(ticks) => {
                let deadline = Instant::now() + ticks.to_duration(Posix::TICK_RATE_HZ);
                while !state.given {
                    state.waiter = Some(current_priority());
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
        }

        state.waiter = None;
        std::mem::replace(&mut state.given, false)
    }

    fn give(&self) {
        self.release();
    }

    fn give_from_isr(&self) -> bool {
        self.release()
            .map_or(false, |waiter| waiter > current_priority())
    }
}
