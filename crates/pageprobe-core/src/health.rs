//! Page-integrity checks: broken images, missing alt text, blocked content and
//! slow resources.

use crate::buffer::{BoundedLog, Subscription};
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Default number of retained health issues.
pub const HEALTH_CAPACITY: usize = 200;

/// Resources slower than this many milliseconds are reported.
pub const SLOW_RESOURCE_MS: f64 = 2000.0;

/// Image sources listed in a summary issue's detail.
const DETAIL_SAMPLE: usize = 5;

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Something is broken
    Error,
    /// Something is degraded
    Warn,
}

impl Severity {
    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
        }
    }
}

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthCategory {
    /// Broken image
    Image,
    /// Insecure content on a secure page
    MixedContent,
    /// Image without alt text
    AltText,
    /// Resource over the slow threshold
    SlowResource,
    /// Blocked cross-origin or policy-violating load
    Cors,
}

impl HealthCategory {
    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::MixedContent => "mixed-content",
            Self::AltText => "alt-text",
            Self::SlowResource => "slow-resource",
            Self::Cors => "cors",
        }
    }
}

/// One detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIssue {
    /// Id, unique within the health log
    pub id: u64,
    /// Severity
    pub severity: Severity,
    /// Category
    pub category: HealthCategory,
    /// Human-readable summary
    pub message: String,
    /// Extra context
    pub detail: Option<String>,
    /// Epoch milliseconds
    pub timestamp: f64,
}

/// What the scan reads from one image element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    /// `src` attribute
    pub src: String,
    /// Natural width
    pub natural_width: u32,
    /// Natural height
    pub natural_height: u32,
    /// Loading finished (successfully or not)
    pub complete: bool,
    /// `alt` attribute; `None` when absent
    pub alt: Option<String>,
}

impl ImageInfo {
    /// Finished loading with a source but has no natural size.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.complete && !self.src.is_empty() && (self.natural_width == 0 || self.natural_height == 0)
    }

    /// Has no `alt` attribute at all (an empty one marks a decorative image).
    #[must_use]
    pub const fn is_missing_alt(&self) -> bool {
        self.alt.is_none()
    }
}

/// A content-security-policy violation event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Blocked URI
    pub blocked_uri: String,
    /// Directive that blocked it
    pub violated_directive: String,
    /// Document or script that attempted the load
    pub source_file: Option<String>,
}

impl PolicyViolation {
    /// The blocked load was plain `http:`.
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        self.blocked_uri
            .get(..5)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http:"))
    }
}

/// One resource-timing record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceTiming {
    /// Resource URL
    pub name: String,
    /// Load duration (ms)
    pub duration: f64,
    /// Initiator, e.g. `img` or `script`
    pub initiator_type: String,
}

/// The page capability the health checks run against.
pub trait PageSurface {
    /// Current image elements.
    fn images(&self) -> Vec<ImageInfo>;

    /// Deliver every future policy violation to `handler`.
    fn on_policy_violation(&self, handler: Box<dyn Fn(PolicyViolation)>);

    /// Deliver every future resource timing to `handler`.
    fn on_resource_timing(&self, handler: Box<dyn Fn(ResourceTiming)>);
}

/// Issue counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// `Error` issues
    pub errors: usize,
    /// `Warn` issues
    pub warnings: usize,
}

impl HealthSummary {
    /// Total issue count.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.errors + self.warnings
    }
}

struct HealthInner {
    log: BoundedLog<HealthIssue>,
    clock: Rc<dyn Clock>,
    slow_threshold_ms: f64,
    installed: Cell<bool>,
}

/// Health capture state.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Rc<HealthInner>,
}

impl HealthMonitor {
    /// Create a monitor retaining `capacity` issues.
    #[must_use]
    pub fn new(capacity: usize, slow_threshold_ms: f64, clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(HealthInner {
                log: BoundedLog::new(capacity),
                clock,
                slow_threshold_ms,
                installed: Cell::new(false),
            }),
        }
    }

    /// Scan once and register continuous listeners.
    ///
    /// Only the first call does anything; it returns `true`.
    pub fn install(&self, page: &dyn PageSurface) -> bool {
        if self.inner.installed.replace(true) {
            tracing::debug!("health checks already installed");
            return false;
        }

        self.scan_images(&page.images());

        let monitor = self.clone();
        page.on_policy_violation(Box::new(move |violation| {
            monitor.record_violation(&violation);
        }));
        let monitor = self.clone();
        page.on_resource_timing(Box::new(move |timing| {
            monitor.record_resource(&timing);
        }));
        true
    }

    /// Check if [`HealthMonitor::install`] has run.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner.installed.get()
    }

    /// One summary issue per category with a non-zero count.
    pub fn scan_images(&self, images: &[ImageInfo]) {
        let broken: Vec<&ImageInfo> = images.iter().filter(|img| img.is_broken()).collect();
        if !broken.is_empty() {
            self.push(
                Severity::Error,
                HealthCategory::Image,
                format!("{} broken {}", broken.len(), plural(broken.len(), "image", "images")),
                sample_sources(&broken),
            );
        }

        let missing: Vec<&ImageInfo> = images.iter().filter(|img| img.is_missing_alt()).collect();
        if !missing.is_empty() {
            self.push(
                Severity::Warn,
                HealthCategory::AltText,
                format!(
                    "{} {} missing alt text",
                    missing.len(),
                    plural(missing.len(), "image", "images")
                ),
                sample_sources(&missing),
            );
        }
    }

    /// One issue per violation.
    pub fn record_violation(&self, violation: &PolicyViolation) {
        let detail = violation
            .source_file
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|source| format!("{} (from {source})", violation.violated_directive))
            .or_else(|| Some(violation.violated_directive.clone()).filter(|d| !d.is_empty()));

        if violation.is_insecure() {
            self.push(
                Severity::Error,
                HealthCategory::MixedContent,
                format!("Mixed content blocked: {}", violation.blocked_uri),
                detail,
            );
        } else {
            self.push(
                Severity::Warn,
                HealthCategory::Cors,
                format!("Blocked by content policy: {}", violation.blocked_uri),
                detail,
            );
        }
    }

    /// One issue when the resource exceeded the slow threshold.
    pub fn record_resource(&self, timing: &ResourceTiming) {
        if timing.duration <= self.inner.slow_threshold_ms {
            return;
        }
        self.push(
            Severity::Warn,
            HealthCategory::SlowResource,
            format!("Slow resource ({}ms): {}", timing.duration.round(), timing.name),
            Some(timing.initiator_type.clone()).filter(|i| !i.is_empty()),
        );
    }

    fn push(&self, severity: Severity, category: HealthCategory, message: String, detail: Option<String>) {
        let issue = HealthIssue {
            id: self.inner.log.next_id(),
            severity,
            category,
            message,
            detail,
            timestamp: self.inner.clock.epoch_millis(),
        };
        tracing::trace!(id = issue.id, category = category.as_str(), "health issue captured");
        self.inner.log.push(issue);
    }

    /// Counts by severity.
    #[must_use]
    pub fn summary(&self) -> HealthSummary {
        self.inner
            .log
            .entries()
            .iter()
            .fold(HealthSummary::default(), |mut acc, issue| {
                match issue.severity {
                    Severity::Error => acc.errors += 1,
                    Severity::Warn => acc.warnings += 1,
                }
                acc
            })
    }

    /// Ordered copy of captured issues.
    #[must_use]
    pub fn entries(&self) -> Vec<HealthIssue> {
        self.inner.log.entries()
    }

    /// Remove all issues and notify subscribers.
    pub fn clear(&self) {
        self.inner.log.clear();
    }

    /// Register a change callback.
    pub fn subscribe<F: Fn() + 'static>(&self, callback: F) -> Subscription {
        self.inner.log.subscribe(callback)
    }

    /// The underlying log.
    #[must_use]
    pub fn log(&self) -> &BoundedLog<HealthIssue> {
        &self.inner.log
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("log", &self.inner.log)
            .field("installed", &self.inner.installed.get())
            .finish()
    }
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

fn sample_sources(images: &[&ImageInfo]) -> Option<String> {
    let mut sample: Vec<&str> = images
        .iter()
        .map(|img| img.src.as_str())
        .filter(|src| !src.is_empty())
        .take(DETAIL_SAMPLE)
        .collect();
    if sample.is_empty() {
        return None;
    }
    let rest = images.len().saturating_sub(sample.len());
    let more = format!("and {rest} more");
    if rest > 0 {
        sample.push(&more);
    }
    Some(sample.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::RefCell;

    type ViolationHandler = Box<dyn Fn(PolicyViolation)>;
    type TimingHandler = Box<dyn Fn(ResourceTiming)>;

    #[derive(Default)]
    struct FakePage {
        images: Vec<ImageInfo>,
        violation_handlers: RefCell<Vec<ViolationHandler>>,
        timing_handlers: RefCell<Vec<TimingHandler>>,
    }

    impl FakePage {
        fn violate(&self, violation: PolicyViolation) {
            for handler in self.violation_handlers.borrow().iter() {
                handler(violation.clone());
            }
        }

        fn load(&self, timing: ResourceTiming) {
            for handler in self.timing_handlers.borrow().iter() {
                handler(timing.clone());
            }
        }
    }

    impl PageSurface for FakePage {
        fn images(&self) -> Vec<ImageInfo> {
            self.images.clone()
        }

        fn on_policy_violation(&self, handler: Box<dyn Fn(PolicyViolation)>) {
            self.violation_handlers.borrow_mut().push(handler);
        }

        fn on_resource_timing(&self, handler: Box<dyn Fn(ResourceTiming)>) {
            self.timing_handlers.borrow_mut().push(handler);
        }
    }

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(HEALTH_CAPACITY, SLOW_RESOURCE_MS, Rc::new(ManualClock::new(0.0)))
    }

    fn image(src: &str, width: u32, alt: Option<&str>) -> ImageInfo {
        ImageInfo {
            src: src.to_string(),
            natural_width: width,
            natural_height: width,
            complete: true,
            alt: alt.map(String::from),
        }
    }

    #[test]
    fn test_install_twice_then_one_violation() {
        let monitor = monitor();
        let page = FakePage::default();
        assert!(monitor.install(&page));
        assert!(!monitor.install(&page));

        page.violate(PolicyViolation {
            blocked_uri: "http://cdn.example.com/a.js".into(),
            violated_directive: "script-src".into(),
            source_file: None,
        });

        let issues = monitor.entries();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, HealthCategory::MixedContent);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_scan_summarizes_per_category() {
        let monitor = monitor();
        let page = FakePage {
            images: vec![
                image("/a.png", 0, Some("a")),
                image("/b.png", 0, None),
                image("/c.png", 64, None),
                image("/d.png", 64, Some("")),
                image("", 0, Some("placeholder")),
            ],
            ..FakePage::default()
        };
        monitor.install(&page);

        let issues = monitor.entries();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].category, HealthCategory::Image);
        assert_eq!(issues[0].message, "2 broken images");
        assert_eq!(issues[0].detail.as_deref(), Some("/a.png, /b.png"));
        assert_eq!(issues[1].category, HealthCategory::AltText);
        assert_eq!(issues[1].message, "2 images missing alt text");
    }

    #[test]
    fn test_scan_with_healthy_images_reports_nothing() {
        let monitor = monitor();
        monitor.scan_images(&[image("/ok.png", 10, Some("ok"))]);
        assert!(monitor.entries().is_empty());
    }

    #[test]
    fn test_incomplete_image_is_not_broken() {
        let mut img = image("/loading.png", 0, Some("x"));
        img.complete = false;
        assert!(!img.is_broken());
    }

    #[test]
    fn test_detail_sample_is_capped() {
        let monitor = monitor();
        let images: Vec<_> = (0..8).map(|i| image(&format!("/{i}.png"), 0, Some("x"))).collect();
        monitor.scan_images(&images);
        let detail = monitor.entries()[0].detail.clone().unwrap();
        assert_eq!(detail, "/0.png, /1.png, /2.png, /3.png, /4.png, and 3 more");
    }

    #[test]
    fn test_secure_violation_is_cors() {
        let monitor = monitor();
        monitor.record_violation(&PolicyViolation {
            blocked_uri: "https://other.example.com/font.woff".into(),
            violated_directive: "font-src".into(),
            source_file: Some("https://example.com/style.css".into()),
        });
        let issue = &monitor.entries()[0];
        assert_eq!(issue.category, HealthCategory::Cors);
        assert_eq!(issue.severity, Severity::Warn);
        assert_eq!(issue.detail.as_deref(), Some("font-src (from https://example.com/style.css)"));
    }

    #[test]
    fn test_slow_resource_threshold_is_strict() {
        let monitor = monitor();
        let page = FakePage::default();
        monitor.install(&page);
        page.load(ResourceTiming { name: "/at-limit.js".into(), duration: 2000.0, initiator_type: "script".into() });
        page.load(ResourceTiming { name: "/slow.js".into(), duration: 2000.5, initiator_type: "script".into() });

        let issues = monitor.entries();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, HealthCategory::SlowResource);
        assert!(issues[0].message.contains("/slow.js"));
    }

    #[test]
    fn test_summary_counts() {
        let monitor = monitor();
        monitor.scan_images(&[image("/x.png", 0, None)]);
        let summary = monitor.summary();
        assert_eq!(summary, HealthSummary { errors: 1, warnings: 1 });
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&HealthCategory::MixedContent).unwrap(), "\"mixed-content\"");
        assert_eq!(serde_json::to_string(&Severity::Warn).unwrap(), "\"warn\"");
    }
}
