//! Console capture.
//!
//! [`ConsoleMonitor::wrap`] decorates a [`ConsoleBackend`] (the host's
//! original logging functions) so every call is recorded before being
//! forwarded with the untouched arguments.

use crate::buffer::{BoundedLog, Subscription};
use crate::clock::Clock;
use crate::value::{serialize_all, CapturedValue};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Default number of retained console entries.
pub const CONSOLE_CAPACITY: usize = 500;

/// Console severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
}

impl ConsoleLevel {
    /// Every intercepted level.
    pub const ALL: [Self; 4] = [Self::Log, Self::Info, Self::Warn, Self::Error];

    /// Name of the console method for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured console call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    /// Id, unique within the console log
    pub id: u64,
    /// Severity
    pub level: ConsoleLevel,
    /// Serialized positional arguments
    pub args: Vec<String>,
    /// Epoch milliseconds
    pub timestamp: f64,
}

impl ConsoleEntry {
    /// Arguments joined by a single space.
    #[must_use]
    pub fn message(&self) -> String {
        self.args.join(" ")
    }
}

/// The logging capability being wrapped.
pub trait ConsoleBackend {
    /// Emit one call at `level` with the given arguments.
    fn write(&self, level: ConsoleLevel, args: &[CapturedValue]);
}

impl<F> ConsoleBackend for F
where
    F: Fn(ConsoleLevel, &[CapturedValue]),
{
    fn write(&self, level: ConsoleLevel, args: &[CapturedValue]) {
        self(level, args);
    }
}

/// Console capture state.
#[derive(Clone)]
pub struct ConsoleMonitor {
    log: BoundedLog<ConsoleEntry>,
    clock: Rc<dyn Clock>,
    recording: Rc<Cell<bool>>,
}

impl ConsoleMonitor {
    /// Create a monitor retaining `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, clock: Rc<dyn Clock>) -> Self {
        Self {
            log: BoundedLog::new(capacity),
            clock,
            recording: Rc::new(Cell::new(false)),
        }
    }

    /// Record one call.
    ///
    /// Calls made by a subscriber while it is being notified are not
    /// recorded (they would otherwise feed back into the log); `None` is
    /// returned for those.
    pub fn record(&self, level: ConsoleLevel, args: &[CapturedValue]) -> Option<u64> {
        if self.recording.replace(true) {
            return None;
        }

        let id = self.log.next_id();
        let entry = ConsoleEntry {
            id,
            level,
            args: serialize_all(args),
            timestamp: self.clock.epoch_millis(),
        };
        tracing::trace!(id, %level, "console entry captured");
        self.log.push(entry);

        self.recording.set(false);
        Some(id)
    }

    /// Wrap the original backend.
    pub fn wrap<B: ConsoleBackend>(&self, original: B) -> InterceptedConsole<B> {
        InterceptedConsole {
            monitor: self.clone(),
            original,
        }
    }

    /// Ordered copy of captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.log.entries()
    }

    /// Remove all entries and notify subscribers.
    pub fn clear(&self) {
        self.log.clear();
    }

    /// Register a change callback.
    pub fn subscribe<F: Fn() + 'static>(&self, callback: F) -> Subscription {
        self.log.subscribe(callback)
    }

    /// The underlying log.
    #[must_use]
    pub const fn log(&self) -> &BoundedLog<ConsoleEntry> {
        &self.log
    }
}

impl fmt::Debug for ConsoleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleMonitor").field("log", &self.log).finish()
    }
}

/// A console backend that records before forwarding.
pub struct InterceptedConsole<B> {
    monitor: ConsoleMonitor,
    original: B,
}

impl<B> InterceptedConsole<B> {
    /// The monitor this wrapper records into.
    #[must_use]
    pub const fn monitor(&self) -> &ConsoleMonitor {
        &self.monitor
    }
}

impl<B: ConsoleBackend> ConsoleBackend for InterceptedConsole<B> {
    fn write(&self, level: ConsoleLevel, args: &[CapturedValue]) {
        self.monitor.record(level, args);
        self.original.write(level, args);
    }
}
