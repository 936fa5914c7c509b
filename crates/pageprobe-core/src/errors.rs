//! Uncaught-error and unhandled-rejection capture.

use crate::buffer::{BoundedLog, Subscription};
use crate::clock::Clock;
use crate::value::{serialize, CapturedValue};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Default number of retained error entries.
pub const ERROR_CAPACITY: usize = 100;

/// Origin of a captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Global uncaught exception
    #[serde(rename = "error")]
    Error,
    /// Promise rejection nobody handled
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection,
}

impl ErrorKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::UnhandledRejection => "unhandledrejection",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Id, unique within the error log
    pub id: u64,
    /// Error message
    pub message: String,
    /// Stack trace, when available
    pub stack: Option<String>,
    /// Script URL
    pub source: Option<String>,
    /// Line number
    pub line: Option<u32>,
    /// Column number
    pub col: Option<u32>,
    /// Epoch milliseconds
    pub timestamp: f64,
    /// Origin
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ErrorEntry {
    /// `source:line:col` when the location is known.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        let source = self.source.as_deref().filter(|s| !s.is_empty())?;
        Some(match (self.line, self.col) {
            (Some(line), Some(col)) => format!("{source}:{line}:{col}"),
            (Some(line), None) => format!("{source}:{line}"),
            _ => source.to_string(),
        })
    }
}

/// Fields read from an error object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// Constructor name
    pub name: String,
    /// Message
    pub message: String,
    /// Stack trace
    pub stack: Option<String>,
}

/// The arguments of a global uncaught-error notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncaughtError {
    /// Event message
    pub message: String,
    /// Script URL
    pub source: Option<String>,
    /// Line number
    pub line: Option<u32>,
    /// Column number
    pub col: Option<u32>,
    /// The thrown error object, if one was passed
    pub error: Option<ErrorDetails>,
}

type LatestCallback = Rc<dyn Fn(&ErrorEntry)>;

struct ErrorInner {
    log: BoundedLog<ErrorEntry>,
    clock: Rc<dyn Clock>,
    latest: RefCell<Option<LatestCallback>>,
}

/// Error capture state.
#[derive(Clone)]
pub struct ErrorMonitor {
    inner: Rc<ErrorInner>,
}

impl ErrorMonitor {
    /// Create a monitor retaining `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, clock: Rc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(ErrorInner {
                log: BoundedLog::new(capacity),
                clock,
                latest: RefCell::new(None),
            }),
        }
    }

    /// Record an uncaught error.
    pub fn record_uncaught(&self, report: &UncaughtError) -> ErrorEntry {
        let message = report
            .error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(&report.message)
            .to_string();
        let entry = ErrorEntry {
            id: self.inner.log.next_id(),
            message,
            stack: report.error.as_ref().and_then(|e| e.stack.clone()),
            source: report.source.clone().filter(|s| !s.is_empty()),
            line: report.line,
            col: report.col,
            timestamp: self.inner.clock.epoch_millis(),
            kind: ErrorKind::Error,
        };
        self.push(entry.clone());
        entry
    }

    /// Record an unhandled rejection.
    pub fn record_rejection(&self, reason: &CapturedValue, stack: Option<String>) -> ErrorEntry {
        let message = match reason {
            CapturedValue::Error { message, .. } => message.clone(),
            other => serialize(other),
        };
        let entry = ErrorEntry {
            id: self.inner.log.next_id(),
            message,
            stack,
            source: None,
            line: None,
            col: None,
            timestamp: self.inner.clock.epoch_millis(),
            kind: ErrorKind::UnhandledRejection,
        };
        self.push(entry.clone());
        entry
    }

    /// Build a handler that records and then defers to `previous`.
    ///
    /// The previous handler's return value is passed through, so a handler
    /// that suppressed default reporting keeps doing so.
    pub fn chain<R, F>(&self, previous: Option<F>) -> impl Fn(&UncaughtError) -> R
    where
        R: Default,
        F: Fn(&UncaughtError) -> R,
    {
        let monitor = self.clone();
        move |report| {
            monitor.record_uncaught(report);
            previous.as_ref().map_or_else(R::default, |handler| handler(report))
        }
    }

    /// Set the single latest-error callback, replacing any previous one.
    pub fn on_latest_error<F: Fn(&ErrorEntry) + 'static>(&self, callback: F) {
        *self.inner.latest.borrow_mut() = Some(Rc::new(callback));
    }

    /// Remove the latest-error callback.
    pub fn clear_latest_error_callback(&self) {
        self.inner.latest.borrow_mut().take();
    }

    fn push(&self, entry: ErrorEntry) {
        tracing::trace!(id = entry.id, kind = %entry.kind, "error entry captured");
        self.inner.log.push(entry.clone());
        let latest = self.inner.latest.borrow().clone();
        if let Some(callback) = latest {
            callback(&entry);
        }
    }

    /// Ordered copy of captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.inner.log.entries()
    }

    /// Remove all entries and notify subscribers.
    pub fn clear(&self) {
        self.inner.log.clear();
    }

    /// Register a change callback.
    pub fn subscribe<F: Fn() + 'static>(&self, callback: F) -> Subscription {
        self.inner.log.subscribe(callback)
    }

    /// The underlying log.
    #[must_use]
    pub fn log(&self) -> &BoundedLog<ErrorEntry> {
        &self.inner.log
    }
}

impl fmt::Debug for ErrorMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorMonitor")
            .field("log", &self.inner.log)
            .field("latest", &self.inner.latest.borrow().is_some())
            .finish()
    }
}
