//! Fault hook for hosted builds

use std::process;

use log::error;

/// Log the violated check and abort the process
pub fn on_fault(module: &'static str, location: u32) -> ! {
    error!("fault in {} at line {}", module, location);
    log::logger().flush();
    process::abort()
}

/// Route framework faults to [`on_fault`]
pub fn install_fault_hook() {
    freeact_core::set_fault_hook(on_fault);
}
