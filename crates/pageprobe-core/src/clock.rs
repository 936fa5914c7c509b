//! Time sources used to stamp captured entries.

use std::cell::Cell;

/// Source of monotonic and wall-clock time, both in milliseconds.
pub trait Clock {
    /// Monotonic time used for durations (page-relative in the browser).
    fn now(&self) -> f64;

    /// Milliseconds since the Unix epoch, used for entry timestamps.
    fn epoch_millis(&self) -> f64;
}

/// Clock driven by the host process.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    /// Create a clock whose monotonic origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn epoch_millis(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Manually advanced clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
    epoch: Cell<f64>,
}

impl ManualClock {
    /// Create a clock at monotonic time 0 and the given epoch time.
    #[must_use]
    pub fn new(epoch_millis: f64) -> Self {
        Self {
            now: Cell::new(0.0),
            epoch: Cell::new(epoch_millis),
        }
    }

    /// Move both time sources forward.
    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
        self.epoch.set(self.epoch.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn epoch_millis(&self) -> f64 {
        self.epoch.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000.0);
        clock.advance(250.0);
        assert_eq!(clock.now(), 250.0);
        assert_eq!(clock.epoch_millis(), 1_250.0);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(clock.epoch_millis() > 0.0);
    }
}
