//! Web-vitals capture and rating.
//!
//! Five metrics are derived from independent timing facilities. Each
//! facility delivers batches of raw timings to one `on_*` handler; a
//! facility the platform lacks simply never calls its handler.

use crate::buffer::{BoundedLog, Listeners, Subscription};
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Default number of retained perf entries, shared by all metrics.
pub const PERF_CAPACITY: usize = 100;

/// A tracked quality metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    /// Largest Contentful Paint (ms)
    Lcp,
    /// Cumulative Layout Shift (unitless)
    Cls,
    /// Interaction to Next Paint (ms)
    Inp,
    /// First Contentful Paint (ms)
    Fcp,
    /// Time to First Byte (ms)
    Ttfb,
}

impl Metric {
    /// Every metric.
    pub const ALL: [Self; 5] = [Self::Lcp, Self::Cls, Self::Inp, Self::Fcp, Self::Ttfb];

    /// `(good, poor)` upper bounds.
    #[must_use]
    pub const fn thresholds(self) -> (f64, f64) {
        match self {
            Self::Lcp => (2500.0, 4000.0),
            Self::Cls => (0.1, 0.25),
            Self::Inp => (200.0, 500.0),
            Self::Fcp => (1800.0, 3000.0),
            Self::Ttfb => (800.0, 1800.0),
        }
    }

    /// Upper-case metric name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lcp => "LCP",
            Self::Cls => "CLS",
            Self::Inp => "INP",
            Self::Fcp => "FCP",
            Self::Ttfb => "TTFB",
        }
    }

    /// Display unit, empty for unitless metrics.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Cls => "",
            _ => "ms",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality bucket of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    /// At or below the good threshold
    Good,
    /// At or below the poor threshold
    NeedsImprovement,
    /// Above the poor threshold
    Poor,
}

impl Rating {
    /// Kebab-case rating name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::NeedsImprovement => "needs-improvement",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate a value; each boundary belongs to the better tier.
#[must_use]
pub fn rate(metric: Metric, value: f64) -> Rating {
    let (good, poor) = metric.thresholds();
    if value <= good {
        Rating::Good
    } else if value <= poor {
        Rating::NeedsImprovement
    } else {
        Rating::Poor
    }
}

/// Round to whole units, or to 3 decimals for CLS.
#[must_use]
pub fn round_metric(metric: Metric, value: f64) -> f64 {
    match metric {
        Metric::Cls => (value * 1000.0).round() / 1000.0,
        _ => value.round(),
    }
}

/// One metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfEntry {
    /// Id, unique within the perf log
    pub id: u64,
    /// Epoch milliseconds
    pub timestamp: f64,
    /// Metric
    pub metric: Metric,
    /// Rounded value
    pub value: f64,
    /// Rating of the rounded value
    pub rating: Rating,
}

/// One layout-shift record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutShift {
    /// Shift score
    pub value: f64,
    /// Shift attributed to recent user input
    pub had_recent_input: bool,
}

/// One paint-timing record.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintTiming {
    /// Paint name, e.g. `first-contentful-paint`
    pub name: String,
    /// Offset from navigation start (ms)
    pub start_time: f64,
}

/// The navigation-timing fields TTFB is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationTiming {
    /// Request start offset (ms)
    pub request_start: f64,
    /// First response byte offset (ms)
    pub response_start: f64,
}

const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

struct PerfInner {
    log: BoundedLog<PerfEntry>,
    clock: Rc<dyn Clock>,
    listeners: Listeners<PerfEntry>,
    cls_total: Cell<f64>,
}

/// Performance capture state.
#[derive(Clone)]
pub struct PerfMonitor {
    inner: Rc<PerfInner>,
}

impl PerfMonitor {
    /// Create a monitor retaining `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(PerfInner {
                log: BoundedLog::new(capacity),
                clock,
                listeners: Listeners::new(),
                cls_total: Cell::new(0.0),
            }),
        }
    }

    /// Round, rate, store and push one sample.
    pub fn report(&self, metric: Metric, raw: f64) -> PerfEntry {
        let value = round_metric(metric, raw);
        let entry = PerfEntry {
            id: self.inner.log.next_id(),
            timestamp: self.inner.clock.epoch_millis(),
            metric,
            value,
            rating: rate(metric, value),
        };
        tracing::trace!(id = entry.id, %metric, value, "perf entry captured");
        self.inner.log.push(entry.clone());
        self.inner.listeners.notify(&entry);
        entry
    }

    /// Largest-paint batch: the last candidate is the current final value.
    pub fn on_largest_paint(&self, candidates: &[f64]) -> Option<PerfEntry> {
        candidates
            .last()
            .map(|start_time| self.report(Metric::Lcp, *start_time))
    }

    /// Layout-shift batch: each shift not caused by recent input adds to the
    /// page-lifetime sum, which is reported after every such shift.
    pub fn on_layout_shifts(&self, shifts: &[LayoutShift]) -> Vec<PerfEntry> {
        shifts
            .iter()
            .filter(|shift| !shift.had_recent_input)
            .map(|shift| {
                let total = self.inner.cls_total.get() + shift.value;
                self.inner.cls_total.set(total);
                self.report(Metric::Cls, total)
            })
            .collect()
    }

    /// Event-timing batch: every duration is an independent sample.
    pub fn on_event_timings(&self, durations: &[f64]) -> Vec<PerfEntry> {
        durations
            .iter()
            .map(|duration| self.report(Metric::Inp, *duration))
            .collect()
    }

    /// Paint batch: only `first-contentful-paint` is reported.
    pub fn on_paints(&self, paints: &[PaintTiming]) -> Option<PerfEntry> {
        paints
            .iter()
            .find(|paint| paint.name == FIRST_CONTENTFUL_PAINT)
            .map(|paint| self.report(Metric::Fcp, paint.start_time))
    }

    /// Navigation timing: TTFB, clamped at 0.
    pub fn on_navigation(&self, timing: NavigationTiming) -> PerfEntry {
        let ttfb = (timing.response_start - timing.request_start).max(0.0);
        self.report(Metric::Ttfb, ttfb)
    }

    /// Running layout-shift sum.
    #[must_use]
    pub fn cumulative_layout_shift(&self) -> f64 {
        self.inner.cls_total.get()
    }

    /// Most recent sample of one metric.
    #[must_use]
    pub fn latest(&self, metric: Metric) -> Option<PerfEntry> {
        self.inner
            .log
            .entries()
            .into_iter()
            .rev()
            .find(|entry| entry.metric == metric)
    }

    /// Register a push listener receiving each new entry.
    pub fn listen<F: Fn(&PerfEntry) + 'static>(&self, callback: F) -> Subscription {
        self.inner.listeners.add(callback)
    }

    /// Ordered copy of captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<PerfEntry> {
        self.inner.log.entries()
    }

    /// Remove all entries and notify subscribers. The layout-shift sum is
    /// kept.
    pub fn clear(&self) {
        self.inner.log.clear();
    }

    /// Register a change callback.
    pub fn subscribe<F: Fn() + 'static>(&self, callback: F) -> Subscription {
        self.inner.log.subscribe(callback)
    }

    /// The underlying log.
    #[must_use]
    pub fn log(&self) -> &BoundedLog<PerfEntry> {
        &self.inner.log
    }
}

impl fmt::Debug for PerfMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfMonitor")
            .field("log", &self.inner.log)
            .field("cls_total", &self.inner.cls_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;
    use std::cell::RefCell;

    fn monitor() -> PerfMonitor {
        PerfMonitor::new(PERF_CAPACITY, Rc::new(ManualClock::new(0.0)))
    }

    // =========================================================================
    // Rating
    // =========================================================================

    #[test]
    fn test_rate_lcp_tiers() {
        assert_eq!(rate(Metric::Lcp, 2000.0), Rating::Good);
        assert_eq!(rate(Metric::Lcp, 3000.0), Rating::NeedsImprovement);
        assert_eq!(rate(Metric::Lcp, 5000.0), Rating::Poor);
    }

    #[test]
    fn test_rate_boundaries_inclusive_on_lower_tier() {
        for metric in Metric::ALL {
            let (good, poor) = metric.thresholds();
            assert_eq!(rate(metric, good), Rating::Good, "{metric} good");
            assert_eq!(rate(metric, poor), Rating::NeedsImprovement, "{metric} poor");
        }
    }

    #[test]
    fn test_round_metric() {
        assert_eq!(round_metric(Metric::Cls, 0.123_456), 0.123);
        assert_eq!(round_metric(Metric::Lcp, 1234.6), 1235.0);
        assert_eq!(round_metric(Metric::Ttfb, 99.4), 99.0);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Metric::Ttfb).unwrap(), "\"TTFB\"");
        assert_eq!(
            serde_json::to_string(&Rating::NeedsImprovement).unwrap(),
            "\"needs-improvement\""
        );
    }

    proptest! {
        #[test]
        fn prop_rating_monotonic(a in 0.0f64..10_000.0, b in 0.0f64..10_000.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for metric in Metric::ALL {
                let order = |r: Rating| match r {
                    Rating::Good => 0,
                    Rating::NeedsImprovement => 1,
                    Rating::Poor => 2,
                };
                prop_assert!(order(rate(metric, lo)) <= order(rate(metric, hi)));
            }
        }
    }

    // =========================================================================
    // Facilities
    // =========================================================================

    #[test]
    fn test_largest_paint_reports_last_candidate() {
        let monitor = monitor();
        let entry = monitor.on_largest_paint(&[800.0, 1900.2, 2600.7]).unwrap();
        assert_eq!(entry.metric, Metric::Lcp);
        assert_eq!(entry.value, 2601.0);
        assert_eq!(entry.rating, Rating::NeedsImprovement);
        assert!(monitor.on_largest_paint(&[]).is_none());
        assert_eq!(monitor.entries().len(), 1);
    }

    #[test]
    fn test_layout_shifts_accumulate_and_skip_input() {
        let monitor = monitor();
        let first = monitor.on_layout_shifts(&[
            LayoutShift { value: 0.05, had_recent_input: false },
            LayoutShift { value: 0.5, had_recent_input: true },
            LayoutShift { value: 0.04, had_recent_input: false },
        ]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].value, 0.05);
        assert_eq!(first[1].value, 0.09);

        let later = monitor.on_layout_shifts(&[LayoutShift { value: 0.2, had_recent_input: false }]);
        assert_eq!(later[0].value, 0.29);
        assert_eq!(later[0].rating, Rating::Poor);
    }

    #[test]
    fn test_layout_shift_sum_survives_clear() {
        let monitor = monitor();
        monitor.on_layout_shifts(&[LayoutShift { value: 0.1, had_recent_input: false }]);
        monitor.clear();
        let entries = monitor.on_layout_shifts(&[LayoutShift { value: 0.1, had_recent_input: false }]);
        assert_eq!(entries[0].value, 0.2);
    }

    #[test]
    fn test_event_timings_are_independent_samples() {
        let monitor = monitor();
        let entries = monitor.on_event_timings(&[120.0, 40.0, 610.0]);
        let values: Vec<_> = entries.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![120.0, 40.0, 610.0]);
        assert_eq!(entries[2].rating, Rating::Poor);
    }

    #[test]
    fn test_paints_report_fcp_only() {
        let monitor = monitor();
        let entry = monitor
            .on_paints(&[
                PaintTiming { name: "first-paint".into(), start_time: 300.0 },
                PaintTiming { name: "first-contentful-paint".into(), start_time: 450.4 },
            ])
            .unwrap();
        assert_eq!(entry.metric, Metric::Fcp);
        assert_eq!(entry.value, 450.0);
        assert!(monitor
            .on_paints(&[PaintTiming { name: "first-paint".into(), start_time: 1.0 }])
            .is_none());
    }

    #[test]
    fn test_navigation_ttfb() {
        let monitor = monitor();
        let entry = monitor.on_navigation(NavigationTiming { request_start: 20.0, response_start: 920.0 });
        assert_eq!(entry.value, 900.0);
        assert_eq!(entry.rating, Rating::NeedsImprovement);

        let clamped = monitor.on_navigation(NavigationTiming { request_start: 50.0, response_start: 10.0 });
        assert_eq!(clamped.value, 0.0);
    }

    #[test]
    fn test_listen_receives_entry() {
        let monitor = monitor();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let sub = monitor.listen(move |entry| s.borrow_mut().push(entry.clone()));

        let entry = monitor.on_navigation(NavigationTiming { request_start: 0.0, response_start: 100.0 });
        sub.unsubscribe();
        monitor.on_event_timings(&[10.0]);

        assert_eq!(*seen.borrow(), vec![entry]);
    }

    #[test]
    fn test_latest_per_metric() {
        let monitor = monitor();
        monitor.on_event_timings(&[10.0, 20.0]);
        monitor.on_navigation(NavigationTiming { request_start: 0.0, response_start: 5.0 });
        assert_eq!(monitor.latest(Metric::Inp).unwrap().value, 20.0);
        assert_eq!(monitor.latest(Metric::Ttfb).unwrap().value, 5.0);
        assert!(monitor.latest(Metric::Lcp).is_none());
    }

    #[test]
    fn test_shared_capacity() {
        let monitor = PerfMonitor::new(3, Rc::new(ManualClock::new(0.0)));
        monitor.on_event_timings(&[1.0, 2.0]);
        monitor.on_largest_paint(&[3.0]);
        monitor.on_navigation(NavigationTiming { request_start: 0.0, response_start: 4.0 });
        let metrics: Vec<_> = monitor.entries().iter().map(|e| e.metric).collect();
        assert_eq!(metrics, vec![Metric::Inp, Metric::Lcp, Metric::Ttfb]);
    }
}
