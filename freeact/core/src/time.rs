//! Tick arithmetic and timer descriptors

use core::fmt;
use core::time::Duration;

const NSEC_PER_SEC: u128 = 1_000_000_000;

/// Count of kernel ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Smallest delay a timer can be armed with
    pub const ONE: Self = Self(1);

    /// Largest representable delay
    pub const MAX: Self = Self(u32::MAX);

    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Get the raw tick count
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Convert a duration to ticks at `tick_rate_hz`.
    ///
    /// Rounds down, then clamps into `[1, u32::MAX]` so that a short delay
    /// never becomes a zero-period timer.
    pub fn from_duration(duration: Duration, tick_rate_hz: u32) -> Self {
        let ticks = duration.as_nanos() * u128::from(tick_rate_hz) / NSEC_PER_SEC;
        Self(ticks.clamp(1, u128::from(u32::MAX)) as u32)
    }

    /// Convert back to wall-clock time at `tick_rate_hz`
    pub fn to_duration(self, tick_rate_hz: u32) -> Duration {
        Duration::from_micros(u64::from(self.0) * 1_000_000 / u64::from(tick_rate_hz.max(1)))
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ticks", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ticks {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ticks", self.0);
    }
}

/// Reload behaviour of a timer, fixed when the timer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fire once, then stay disarmed
    OneShot,
    /// Fire every period until disarmed
    Periodic,
}

impl TimerKind {
    pub const fn is_periodic(self) -> bool {
        matches!(self, Self::Periodic)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimerKind {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::OneShot => defmt::write!(fmt, "OneShot"),
            Self::Periodic => defmt::write!(fmt, "Periodic"),
        }
    }
}

/// How long a blocking kernel call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately
    NoWait,
    /// Wait at most this many ticks
    Ticks(Ticks),
    /// Wait until the call can complete
    Forever,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_clamps_to_one_tick() {
        assert_eq!(Ticks::from_duration(Duration::ZERO, 1000), Ticks::ONE);
        assert_eq!(Ticks::from_duration(Duration::from_micros(400), 1000), Ticks::ONE);
        assert_eq!(Ticks::from_duration(Duration::from_millis(5), 100), Ticks::ONE);
    }

    #[test]
    fn conversion_rounds_down() {
        assert_eq!(Ticks::from_duration(Duration::from_millis(300), 1000), Ticks(300));
        assert_eq!(Ticks::from_duration(Duration::from_millis(25), 100), Ticks(2));
        assert_eq!(Ticks::from_duration(Duration::from_secs(2), 100), Ticks(200));
    }

    #[test]
    fn fast_tick_rates_keep_sub_millisecond_precision() {
        assert_eq!(Ticks::from_duration(Duration::from_micros(1500), 10_000), Ticks(15));
        assert_eq!(Ticks::from_duration(Duration::from_micros(250), 32_768), Ticks(8));
    }

    #[test]
    fn huge_duration_saturates() {
        assert_eq!(Ticks::from_duration(Duration::from_secs(u64::MAX), 1000), Ticks::MAX);
    }

    #[test]
    fn back_to_duration() {
        assert_eq!(Ticks(250).to_duration(1000), Duration::from_millis(250));
        assert_eq!(Ticks(3).to_duration(100), Duration::from_millis(30));
    }
}
