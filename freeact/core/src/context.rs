//! Execution-context tokens.
//!
//! Operations that behave differently from a thread and from an interrupt
//! handler (`post`, `arm`, `disarm`) take one of these tokens instead of
//! coming in two flavours. The token type picks the non-blocking path at
//! compile time, and an [`IsrContext`] collects whether the interrupted
//! code should be preempted when the handler returns.

use core::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Capability proving which kind of context the caller runs in.
pub trait ExecContext: sealed::Sealed {
    /// True when the caller is an interrupt handler
    const IN_ISR: bool;

    /// Record that a higher-priority thread became ready
    fn request_switch(&mut self, woken: bool);
}

/// Token for code running on a thread.
#[derive(Debug, Default)]
pub struct TaskContext {
    _private: (),
}

impl TaskContext {
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl sealed::Sealed for TaskContext {}

impl ExecContext for TaskContext {
    const IN_ISR: bool = false;

    #[inline]
    fn request_switch(&mut self, _woken: bool) {}
}

/// Token for code running inside an interrupt handler.
///
/// Created by the port's interrupt entry code; the port reads
/// [`switch_requested`](Self::switch_requested) before returning from the
/// interrupt. Not `Send`: the token belongs to the interrupt that made it.
#[derive(Debug)]
pub struct IsrContext {
    switch_requested: bool,
    _not_send: PhantomData<*const ()>,
}

impl IsrContext {
    /// Open a fresh interrupt context. Intended for port entry code only.
    pub const fn new() -> Self {
        Self {
            switch_requested: false,
            _not_send: PhantomData,
        }
    }

    /// Whether a higher-priority thread should run on interrupt exit
    pub fn switch_requested(&self) -> bool {
        self.switch_requested
    }
}

impl Default for IsrContext {
    fn default() -> Self {
        Self::new()
    }
}

impl sealed::Sealed for IsrContext {}

impl ExecContext for IsrContext {
    const IN_ISR: bool = true;

    #[inline]
    fn request_switch(&mut self, woken: bool) {
        self.switch_requested |= woken;
    }
}
