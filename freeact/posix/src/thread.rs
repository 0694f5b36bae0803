//! Threads for active objects.
//!
//! Each thread is a plain `std` thread named after its owner. The host
//! scheduler ignores priorities, so the priority is kept per thread and only
//! used to decide whether an interrupt readied a more urgent thread.

use std::cell::Cell;
use std::thread;

use freeact_core::{FaError, FaResult, ThreadSpec};
use log::{debug, error};

/// Smallest stack requested from the host, whatever the caller reserved
pub const MIN_STACK_SIZE: usize = 256 * 1024;

/// Priority reported for threads the port did not create
pub const BACKGROUND_PRIORITY: u8 = 0;

thread_local! {
    static PRIORITY: Cell<u8> = const { Cell::new(BACKGROUND_PRIORITY) };
}

/// Priority of the calling thread
pub fn current_priority() -> u8 {
    PRIORITY.with(Cell::get)
}

pub(crate) fn set_current_priority(priority: u8) {
    PRIORITY.with(|p| p.set(priority));
}

/// Handle to a thread created by the port
#[derive(Debug, Clone)]
pub struct PosixThread {
    handle: thread::Thread,
    priority: u8,
}

impl PosixThread {
    pub fn name(&self) -> Option<&str> {
        self.handle.name()
    }

    pub fn id(&self) -> thread::ThreadId {
        self.handle.id()
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }
}

pub(crate) fn spawn<A: Sync + 'static>(
    spec: ThreadSpec,
    entry: fn(&'static A) -> !,
    arg: &'static A,
) -> FaResult<PosixThread> {
    let ThreadSpec {
        name,
        priority,
        stack,
    } = spec;
    let stack_size = stack.len().max(MIN_STACK_SIZE);

    let join = thread::Builder::new()
        .name(name.to_string())
        .stack_size(stack_size)
        .spawn(move || {
            set_current_priority(priority);
            entry(arg);
        })
        .map_err(|err| {
            error!("{}: thread creation failed: {}", name, err);
            FaError::ThreadSpawn
        })?;

    debug!("{}: thread up, priority {}, stack {} bytes", name, priority, stack_size);
    Ok(PosixThread {
        handle: join.thread().clone(),
        priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn unmanaged_threads_run_at_background_priority() {
        assert_eq!(current_priority(), BACKGROUND_PRIORITY);
    }

    #[test]
    fn spawned_thread_sees_its_priority() {
        static REPORT: Mutex<Option<mpsc::Sender<(u8, Option<String>)>>> = Mutex::new(None);

        fn report(_: &'static ()) -> ! {
            let name = thread::current().name().map(str::to_owned);
            if let Some(tx) = REPORT.lock().unwrap().as_ref() {
                tx.send((current_priority(), name)).unwrap();
            }
            loop {
                thread::park();
            }
        }

        let (tx, rx) = mpsc::channel();
        *REPORT.lock().unwrap() = Some(tx);

        let stack: &'static mut [u8] = Box::leak(Box::new([0u8; 64]));
        let spec = ThreadSpec {
            name: "worker",
            priority: 7,
            stack,
        };
        let handle = spawn(spec, report, &()).unwrap();

        assert_eq!(handle.priority(), 7);
        assert_eq!(handle.name(), Some("worker"));
        let (priority, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(priority, 7);
        assert_eq!(name.as_deref(), Some("worker"));
    }
}
