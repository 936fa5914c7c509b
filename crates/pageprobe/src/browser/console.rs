//! Console patching.

use super::convert::capture_args;
use super::interpose::patch;
use pageprobe_core::{ConsoleLevel, ConsoleMonitor};
use wasm_bindgen::JsValue;

/// Wrap `console.log`, `info`, `warn` and `error`.
///
/// Returns `false` when there is no console object; levels the console lacks
/// are skipped.
pub fn install(monitor: &ConsoleMonitor) -> bool {
    let console = super::convert::get_value(&js_sys::global(), "console");
    if !console.is_object() {
        tracing::debug!("no console object, console capture skipped");
        return false;
    }

    let mut patched = 0;
    for level in ConsoleLevel::ALL {
        let monitor = monitor.clone();
        let hooked = patch(&console, level.as_str(), move |_this: JsValue, args| {
            monitor.record(level, &capture_args(&args));
        });
        if hooked {
            patched += 1;
        }
    }
    tracing::debug!(patched, "console capture installed");
    patched > 0
}
