#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # FreeAct Queue
//!
//! Bounded lock-free multi-producer single-consumer event queue. Each queue
//! owns a fixed array of nodes, so enqueuing never allocates, never takes
//! a lock and is safe from interrupt handlers. A full queue is an ordinary
//! outcome reported to the producer together with the rejected item.

use core::fmt;

mod pool;
mod queue;

pub use queue::{Consumer, EventQueue};

/// Error returned by [`EventQueue::enqueue`] when every node is in flight.
///
/// Carries the rejected item back to the caller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event queue full")
    }
}

#[cfg(feature = "std")]
impl<T> std::error::Error for QueueFull<T> {}

#[cfg(feature = "defmt")]
impl<T> defmt::Format for QueueFull<T> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "QueueFull");
    }
}

/// Node pool occupancy of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of usable nodes
    pub capacity: usize,
    /// Nodes currently free
    pub free: usize,
    /// Fewest free nodes ever observed
    pub min_free: usize,
}

impl QueueStats {
    /// Nodes currently carrying an item
    pub const fn used(&self) -> usize {
        self.capacity - self.free
    }

    /// Check if the queue has ever run out of nodes
    pub const fn has_overflowed(&self) -> bool {
        self.min_free == 0
    }

    /// Peak usage as a percentage of capacity (0-100)
    pub const fn peak_utilization(&self) -> usize {
        if self.capacity == 0 {
            0
        } else {
            ((self.capacity - self.min_free) * 100) / self.capacity
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QueueStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "QueueStats {{ capacity: {}, free: {}, min_free: {} }}",
            self.capacity,
            self.free,
            self.min_free
        );
    }
}
