//! Process-wide fault hook.
//!
//! Contract violations (a required handle missing, a second start, a corrupt
//! queue, a rejected kernel command) are not reported to the caller. They
//! divert to the fault hook, which must not return: the system halts or
//! resets instead of running on with state it can no longer trust.

use core::cell::Cell;

use critical_section::Mutex;

/// Signature of a fault hook: module path and source line of the failure.
pub type FaultHook = fn(module: &'static str, location: u32) -> !;

static FAULT_HOOK: Mutex<Cell<Option<FaultHook>>> = Mutex::new(Cell::new(None));

/// Install the hook called by [`on_fault`]. Replaces any earlier hook.
pub fn set_fault_hook(hook: FaultHook) {
    critical_section::with(|cs| FAULT_HOOK.borrow(cs).set(Some(hook)));
}

/// Report a violated invariant. Never returns.
///
/// Without an installed hook this panics with the location.
#[cold]
#[inline(never)]
pub fn on_fault(module: &'static str, location: u32) -> ! {
    let hook = critical_section::with(|cs| FAULT_HOOK.borrow(cs).get());
    match hook {
        Some(hook) => hook(module, location),
        None => panic!("fault in {} at line {}", module, location),
    }
}

/// Check an invariant, diverting to [`on_fault`] when it does not hold.
#[macro_export]
macro_rules! fa_assert {
    ($check:expr) => {
        if !($check) {
            $crate::on_fault(::core::module_path!(), ::core::line!());
        }
    };
}

/// Unconditionally report a fault at this location.
#[macro_export]
macro_rules! fa_error {
    () => {
        $crate::on_fault(::core::module_path!(), ::core::line!())
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn passing_check_is_silent() {
        fa_assert!(1 + 1 == 2);
    }

    #[test]
    #[should_panic(expected = "fault in freeact_core::fault::tests")]
    fn failing_check_reaches_default_hook() {
        let queue_ok = false;
        fa_assert!(queue_ok);
    }
}
