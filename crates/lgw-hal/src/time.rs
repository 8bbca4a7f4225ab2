//! Time sources and trigger counter arithmetic
//!
//! The concentrator timestamps packets with a free-running 32-bit
//! microsecond counter. The counter is derived from a [`TimeSource`] that
//! only has to be monotonic; the epoch is taken when the concentrator starts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock producing elapsed microseconds
pub trait TimeSource: fmt::Debug + Send + Sync {
    /// Microseconds elapsed since an arbitrary fixed origin
    fn now_us(&self) -> u64;
}

/// Clock backed by [`std::time::Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Manually advanced clock
///
/// Clones share the same time, so a test or simulation can keep one handle
/// and give another to the concentrator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at the given time
    pub fn starting_at(us: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(us)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }

    /// Set the absolute time; values in the past are ignored
    pub fn set(&self, us: u64) {
        self.now.fetch_max(us, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Trigger counter bound to a start epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TriggerCounter {
    epoch_us: u64,
}

impl TriggerCounter {
    pub(crate) fn start(clock: &dyn TimeSource) -> Self {
        Self {
            epoch_us: clock.now_us(),
        }
    }

    /// Microseconds since the epoch, without wrapping
    pub(crate) fn elapsed_us(&self, clock: &dyn TimeSource) -> u64 {
        clock.now_us().saturating_sub(self.epoch_us)
    }

    /// Current 32-bit counter value; wraps every 2^32 µs (~71.6 minutes)
    pub(crate) fn read(&self, clock: &dyn TimeSource) -> u32 {
        self.elapsed_us(clock) as u32
    }
}

/// Microseconds from `earlier` to `later` across a counter wrap
pub fn counter_elapsed(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Signed distance from `now` to `target`
///
/// Targets more than 2^31 µs ahead are read as being in the past.
pub fn counter_offset(now: u32, target: u32) -> i32 {
    target.wrapping_sub(now) as i32
}

/// Whether `counter` has reached `deadline`, modulo 2^32
pub fn counter_reached(counter: u32, deadline: u32) -> bool {
    counter_offset(counter, deadline) <= 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(1_500);
        assert_eq!(other.now_us(), 1_500);
        other.set(10_000);
        assert_eq!(clock.now_us(), 10_000);
        // never goes backwards
        clock.set(5);
        assert_eq!(clock.now_us(), 10_000);
    }

    #[test]
    fn test_trigger_counter_relative_to_epoch() {
        let clock = ManualClock::starting_at(42_000);
        let counter = TriggerCounter::start(&clock);
        assert_eq!(counter.read(&clock), 0);
        clock.advance(1_234);
        assert_eq!(counter.read(&clock), 1_234);
    }

    #[test]
    fn test_trigger_counter_wraps() {
        let clock = ManualClock::new();
        let counter = TriggerCounter::start(&clock);
        clock.set(u32::MAX as u64 + 1 + 16);
        assert_eq!(counter.read(&clock), 16);
    }

    #[test]
    fn test_counter_elapsed_across_wrap() {
        assert_eq!(counter_elapsed(0xFFFF_FF00, 0x0000_0010), 0x110);
        assert_eq!(counter_elapsed(100, 250), 150);
    }

    #[test]
    fn test_counter_offset_and_reached() {
        assert_eq!(counter_offset(1_000, 2_500), 1_500);
        assert_eq!(counter_offset(2_500, 1_000), -1_500);
        assert_eq!(counter_offset(0xFFFF_FFF0, 0x10), 0x20);
        assert!(counter_reached(0x10, 0xFFFF_FFF0));
        assert!(!counter_reached(0xFFFF_FFF0, 0x10));
        assert!(counter_reached(5, 5));
    }

    #[test]
    fn test_monotonic_clock_non_decreasing() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(b >= a);
    }
}
