//! Services a port supplies to the runtime.
//!
//! A port adapts one real-time kernel: it creates threads from caller-owned
//! stacks, provides the binary semaphore each active object sleeps on, runs
//! the timer service and answers whether the caller is in an interrupt.

use core::fmt;

use crate::{FaResult, IsrContext, Ticks, Timeout};

/// Thread creation parameters.
pub struct ThreadSpec {
    /// Kernel-visible thread name
    pub name: &'static str,
    /// Priority, 1-based; larger numbers preempt smaller ones
    pub priority: u8,
    /// Stack memory reserved by the caller for the thread's lifetime
    pub stack: &'static mut [u8],
}

impl fmt::Debug for ThreadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSpec")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("stack_size", &self.stack.len())
            .finish()
    }
}

/// Wake-up primitive an active object's thread blocks on.
pub trait Semaphore: Send + Sync + 'static {
    fn new() -> Self;

    /// Block until given or until `timeout` elapses. Returns `true` if taken.
    fn take(&self, timeout: Timeout) -> bool;

    /// Give from thread context
    fn give(&self);

    /// Give from interrupt context. Returns `true` when the give readied a
    /// thread with higher priority than the interrupted one.
    fn give_from_isr(&self) -> bool;
}

/// Receiver of timer expiry callbacks.
///
/// Called from the timer service's deferred context, never from an
/// interrupt handler.
pub trait Expiry: Sync {
    fn expired(&'static self);
}

/// A kernel software timer.
///
/// Timers are statically allocated and exist dormant from construction, so
/// the first start may come from either context.
pub trait Timer: Send + Sync + 'static {
    /// A dormant timer that fires once per start
    const ONE_SHOT: Self;
    /// A dormant timer that fires every period until stopped
    const PERIODIC: Self;

    /// Reprogram the period and (re)start the timer from a thread
    fn start(&'static self, period: Ticks, target: &'static dyn Expiry) -> FaResult<()>;

    /// Same as [`start`](Self::start) from an interrupt; `Ok(true)` asks for a switch
    fn start_from_isr(
        &'static self,
        period: Ticks,
        target: &'static dyn Expiry,
    ) -> FaResult<bool>;

    /// Stop the timer from a thread
    fn stop(&self) -> FaResult<()>;

    /// Stop the timer from an interrupt; `Ok(true)` asks for a switch
    fn stop_from_isr(&self) -> FaResult<bool>;

    /// True while the timer is counting down
    fn is_active(&self) -> bool;
}

/// A real-time kernel adaptation.
pub trait Port: Sized + 'static {
    type Semaphore: Semaphore;
    type Timer: Timer;
    type Thread: Send + Sync + 'static;

    /// Kernel tick frequency
    const TICK_RATE_HZ: u32;

    /// Create a thread running `entry(arg)` on the stack in `spec`.
    fn spawn<A: Sync + 'static>(
        spec: ThreadSpec,
        entry: fn(&'static A) -> !,
        arg: &'static A,
    ) -> FaResult<Self::Thread>;

    /// True when called from an interrupt handler
    fn in_interrupt() -> bool;

    /// Advance kernel time by one tick; called from the tick interrupt
    fn tick_from_isr(ctx: &mut IsrContext);
}
