//! Simulated interrupt context.
//!
//! A host has no interrupts to hook, so device simulations and the tick
//! source run their handlers through [`interrupt`]. While the handler runs,
//! the calling thread reports itself as interrupt context.

use std::cell::Cell;
use std::thread;

use freeact_core::IsrContext;

thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
}

/// True while the calling thread is inside [`interrupt`]
pub fn in_interrupt() -> bool {
    IN_ISR.with(Cell::get)
}

/// Restores the interrupted state even if the handler unwinds
struct IsrGuard {
    nested: bool,
}

impl IsrGuard {
    fn enter() -> Self {
        Self {
            nested: IN_ISR.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for IsrGuard {
    fn drop(&mut self) {
        IN_ISR.with(|flag| flag.set(self.nested));
    }
}

/// Run `handler` as an interrupt service routine on the calling thread.
///
/// If the handler readied a higher-priority thread, the caller yields on
/// exit, like a context switch requested at the end of a real ISR.
pub fn interrupt<R>(handler: impl FnOnce(&mut IsrContext) -> R) -> R {
    let mut ctx = IsrContext::new();
    let result = {
        let _guard = IsrGuard::enter();
        handler(&mut ctx)
    };

    if ctx.switch_requested() {
        thread::yield_now();
    }
    result
}
