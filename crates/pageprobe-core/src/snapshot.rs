//! On-demand snapshot of client-side key/value stores and cookies.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A readable key/value store.
pub trait KeyValueArea {
    /// Every key/value pair, in store order.
    fn entries(&self) -> Vec<(String, String)>;
}

impl KeyValueArea for Vec<(String, String)> {
    fn entries(&self) -> Vec<(String, String)> {
        self.clone()
    }
}

/// Source of the raw cookie string.
pub trait CookieSource {
    /// `document.cookie`-style text.
    fn cookie_string(&self) -> String;
}

impl CookieSource for &str {
    fn cookie_string(&self) -> String {
        (*self).to_string()
    }
}

impl CookieSource for String {
    fn cookie_string(&self) -> String {
        self.clone()
    }
}

/// Point-in-time copy of both stores and the cookies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    /// Persistent store pairs
    pub local: Vec<(String, String)>,
    /// Session store pairs
    pub session: Vec<(String, String)>,
    /// Raw cookie string
    pub cookies: String,
    /// Epoch milliseconds
    pub captured_at: f64,
}

impl StorageSnapshot {
    /// Split the cookie string into `(name, value)` pairs.
    ///
    /// Segments without `=` are treated as a name with an empty value.
    #[must_use]
    pub fn parsed_cookies(&self) -> Vec<(String, String)> {
        self.cookies
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once('=') {
                Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
                None => (segment.to_string(), String::new()),
            })
            .collect()
    }
}

/// Captures and caches storage snapshots.
pub struct StorageInspector {
    clock: Rc<dyn Clock>,
    latest: RefCell<Option<StorageSnapshot>>,
}

impl StorageInspector {
    /// Create an inspector with no cached snapshot.
    #[must_use]
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            latest: RefCell::new(None),
        }
    }

    /// Read everything now, cache it and return it.
    pub fn capture(
        &self,
        local: &dyn KeyValueArea,
        session: &dyn KeyValueArea,
        cookies: &dyn CookieSource,
    ) -> StorageSnapshot {
        let snapshot = StorageSnapshot {
            local: local.entries(),
            session: session.entries(),
            cookies: cookies.cookie_string(),
            captured_at: self.clock.epoch_millis(),
        };
        tracing::debug!(
            local = snapshot.local.len(),
            session = snapshot.session.len(),
            "storage snapshot captured"
        );
        *self.latest.borrow_mut() = Some(snapshot.clone());
        snapshot
    }

    /// The last captured snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<StorageSnapshot> {
        self.latest.borrow().clone()
    }
}

impl fmt::Debug for StorageInspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageInspector")
            .field("latest", &self.latest.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_capture_reads_all_sources() {
        let clock = Rc::new(ManualClock::new(42.0));
        let inspector = StorageInspector::new(clock);
        assert!(inspector.latest().is_none());

        let local = pairs(&[("theme", "dark"), ("token", "abc")]);
        let session = pairs(&[("step", "2")]);
        let snapshot = inspector.capture(&local, &session, &"sid=1; lang=en");

        assert_eq!(snapshot.local.len(), 2);
        assert_eq!(snapshot.session, session);
        assert_eq!(snapshot.cookies, "sid=1; lang=en");
        assert_eq!(snapshot.captured_at, 42.0);
        assert_eq!(inspector.latest(), Some(snapshot));
    }

    #[test]
    fn test_latest_does_not_refresh() {
        let clock = Rc::new(ManualClock::new(0.0));
        let inspector = StorageInspector::new(clock.clone());
        let mut local = pairs(&[("a", "1")]);
        inspector.capture(&local, &Vec::<(String, String)>::new(), &"");

        local.push(("b".into(), "2".into()));
        clock.advance(100.0);
        let cached = inspector.latest().unwrap();
        assert_eq!(cached.local.len(), 1);
        assert_eq!(cached.captured_at, 0.0);
    }

    #[test]
    fn test_parsed_cookies() {
        let snapshot = StorageSnapshot {
            cookies: "sid=abc; theme = dark;flag; empty=".into(),
            ..StorageSnapshot::default()
        };
        assert_eq!(
            snapshot.parsed_cookies(),
            pairs(&[("sid", "abc"), ("theme", "dark"), ("flag", ""), ("empty", "")])
        );
        assert!(StorageSnapshot::default().parsed_cookies().is_empty());
    }
}
