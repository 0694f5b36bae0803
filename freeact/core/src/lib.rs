#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # FreeAct Core
//!
//! Core types shared by every layer of the FreeAct runtime: event signals,
//! execution-context tokens, tick arithmetic, the traits a port implements
//! to host active objects on a real-time kernel, and the process-wide
//! fault hook used when an invariant is violated.

use core::fmt;

pub mod context;
pub mod events;
pub mod fault;
pub mod port;
pub mod time;

pub use context::*;
pub use events::*;
pub use fault::*;
pub use port::*;
pub use time::*;

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used at the port boundary
pub type FaResult<T> = Result<T, FaError>;

/// Errors reported by port services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaError {
    /// The kernel refused to create a thread
    ThreadSpawn,
    /// A timer command was rejected by the timer service
    TimerCommand,
}

impl fmt::Display for FaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaError::ThreadSpawn => write!(f, "Thread creation failed"),
            FaError::TimerCommand => write!(f, "Timer command rejected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FaError {}

#[cfg(feature = "defmt")]
impl defmt::Format for FaError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            FaError::ThreadSpawn => defmt::write!(fmt, "ThreadSpawn"),
            FaError::TimerCommand => defmt::write!(fmt, "TimerCommand"),
        }
    }
}
