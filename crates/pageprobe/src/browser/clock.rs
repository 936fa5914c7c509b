//! Page clock.

use pageprobe_core::Clock;

/// `performance.now()` for durations and `Date.now()` for timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now(&self) -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map_or_else(js_sys::Date::now, |p| p.now())
    }

    fn epoch_millis(&self) -> f64 {
        js_sys::Date::now()
    }
}
