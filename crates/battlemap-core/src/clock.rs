//! Frame clock abstraction driving camera animations.
//!
//! The host owns the display-refresh loop. It asks a viewport to step once per
//! frame; the viewport reads timestamps from a [`FrameClock`].

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Monotonic millisecond timestamps.
pub trait FrameClock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> f64;
}

/// Wall clock based on [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl FrameClock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock advanced by hand, for headless hosts and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: f64) {
        self.set(self.now_ms() + delta_ms);
    }
}

impl FrameClock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10.0);
        assert_eq!(clock.now_ms(), 10.0);
        clock.advance(16.5);
        assert_eq!(clock.now_ms(), 26.5);
        clock.set(0.0);
        assert_eq!(clock.now_ms(), 0.0);
    }

    #[test]
    fn test_manual_clock_default_starts_at_zero() {
        assert_eq!(ManualClock::default().now_ms(), 0.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
