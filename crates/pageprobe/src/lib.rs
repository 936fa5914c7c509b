//! pageprobe: in-page instrumentation for web applications.
//!
//! Captures console output, network traffic, uncaught errors, web vitals and
//! page health into bounded logs, and renders them into a text report.
//!
//! # Browser Usage (WASM)
//!
//! ```javascript
//! import init, { install, subscribeConsole, consoleEntries, copyReport } from './pageprobe.js';
//!
//! async function main() {
//!     await init();
//!     install();
//!     const unsubscribe = subscribeConsole(() => render(consoleEntries()));
//!     document.querySelector('#copy').onclick = () => copyReport();
//! }
//! ```

#![allow(
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::needless_pass_by_value,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::future_not_send,
    clippy::type_complexity,
    unreachable_pub
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub use pageprobe_core::*;

pub mod browser;

#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserClock, BrowserPage, FetchTransport};

pub use browser::{Cookies, Storage, StorageType};
