//! Core capture types for pageprobe.
//!
//! Everything here is platform-independent; the browser runtime in the
//! `pageprobe` crate feeds host activity into these monitors.
//!
//! - Capture storage: [`buffer::BoundedLog`], [`buffer::Listeners`]
//! - Monitors: [`ConsoleMonitor`], [`NetworkMonitor`], [`ErrorMonitor`],
//!   [`PerfMonitor`], [`HealthMonitor`], [`StorageInspector`]
//! - Output: [`report`] formatters, the backend [`ApiClient`]
//! - Setup: [`ProbeConfig`], [`Probe`]

#![allow(
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::future_not_send,
    unreachable_pub
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod api;
pub mod auth;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod errors;
pub mod health;
pub mod network;
pub mod perf;
pub mod probe;
pub mod report;
pub mod snapshot;
pub mod value;

pub use api::{ApiClient, BugReport, OutboundRequest, OutboundResponse, ReportUpload, Transport};
pub use auth::{hash_credential, CredentialStore};
pub use buffer::{BoundedLog, Listeners, Subscription};
pub use clock::{Clock, ManualClock};
#[cfg(not(target_arch = "wasm32"))]
pub use clock::SystemClock;
pub use config::{ApiConfig, Capacities, ProbeConfig};
pub use console::{ConsoleBackend, ConsoleEntry, ConsoleLevel, ConsoleMonitor};
pub use error::{ApiError, AuthError, ConfigError, ProbeError, TransportError};
pub use errors::{ErrorDetails, ErrorEntry, ErrorKind, ErrorMonitor, UncaughtError};
pub use health::{
    HealthCategory, HealthIssue, HealthMonitor, ImageInfo, PageSurface, PolicyViolation,
    ResourceTiming, Severity,
};
pub use network::{
    BodyShape, BodySizing, FetchRequest, FormPart, HeaderShape, NetworkEntry, NetworkMonitor,
    ObservedResponse, RequestInput, ResponseBody, XhrCompletion, XhrHandle,
};
pub use perf::{LayoutShift, Metric, NavigationTiming, PaintTiming, PerfEntry, PerfMonitor, Rating};
pub use probe::{Interceptor, Probe};
pub use report::{ReportBuilder, ReportInput, ReportLimits};
pub use snapshot::{CookieSource, KeyValueArea, StorageInspector, StorageSnapshot};
pub use value::{serialize, CapturedValue};
