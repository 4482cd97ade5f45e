//! Time source abstraction.
//!
//! The core asks for a monotonic tick and an epoch-aligned wall-clock
//! reading; it is otherwise agnostic to how those are produced.
//! Production code gets both from [`SystemTimeSource`]; tests drive a
//! [`FixedTimeSource`] explicitly so state-machine transitions are
//! deterministic.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Free-running monotonic counter plus epoch-aligned wall clock.
///
/// `tick_now` must be non-decreasing on one worker. `realtime_now_ns`
/// shares the epoch of the wire timestamps (Unix epoch in this
/// deployment). Precision floor is 1 microsecond; implementations should
/// avoid unnecessary syscalls on the hot path.
pub trait TimeSource: Send + Sync {
    /// Free-running monotonic tick count.
    fn tick_now(&self) -> u64;
    /// Frequency of the tick counter, in Hz.
    fn tick_hz(&self) -> u64;
    /// Wall-clock nanoseconds since the Unix epoch.
    fn realtime_now_ns(&self) -> u64;
}

/// Convert a tick count to nanoseconds at the given frequency.
#[inline]
pub fn tick_to_ns(tick: u64, hz: u64) -> u64 {
    if hz == 0 {
        return 0;
    }
    // tick * 1e9 / hz, ordered to minimize overflow for realistic hz (MHz-GHz range).
    ((tick as u128 * 1_000_000_000u128) / hz as u128) as u64
}

/// Production time source: a microsecond-resolution monotonic tick
/// derived from [`Instant`], paired with [`SystemTime`] for the wall
/// clock. `tick_hz` is fixed at 1_000_000 (the tick unit is microseconds)
/// so `tick_to_ns` needs no calibration step.
pub struct SystemTimeSource {
    epoch: Instant,
}

impl SystemTimeSource {
    const TICK_HZ: u64 = 1_000_000;

    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn tick_now(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn tick_hz(&self) -> u64 {
        Self::TICK_HZ
    }

    fn realtime_now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Deterministic time source for tests: both readings are set explicitly
/// by the harness between steps.
pub struct FixedTimeSource {
    tick: std::sync::atomic::AtomicU64,
    realtime_ns: std::sync::atomic::AtomicU64,
    hz: u64,
}

impl FixedTimeSource {
    pub fn new(hz: u64) -> Self {
        Self {
            tick: std::sync::atomic::AtomicU64::new(0),
            realtime_ns: std::sync::atomic::AtomicU64::new(0),
            hz,
        }
    }

    pub fn set_tick(&self, tick: u64) {
        self.tick.store(tick, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance_tick(&self, delta: u64) {
        self.tick
            .fetch_add(delta, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_realtime_ns(&self, ns: u64) {
        self.realtime_ns
            .store(ns, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn tick_now(&self) -> u64 {
        self.tick.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn tick_hz(&self) -> u64 {
        self.hz
    }

    fn realtime_now_ns(&self) -> u64 {
        self.realtime_ns.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_to_ns_converts_at_given_frequency() {
        assert_eq!(tick_to_ns(1_000_000, 1_000_000), 1_000_000_000);
        assert_eq!(tick_to_ns(0, 1_000_000), 0);
        assert_eq!(tick_to_ns(1, 0), 0);
    }

    #[test]
    fn system_time_source_tick_is_non_decreasing() {
        let src = SystemTimeSource::new();
        let a = src.tick_now();
        let b = src.tick_now();
        assert!(b >= a);
    }
}
