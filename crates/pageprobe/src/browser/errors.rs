//! Global error and rejection hooks.

use super::convert::{capture_value, error_details, get_value, string_cast};
use super::interpose::method;
use js_sys::{Array, Function, Reflect};
use pageprobe_core::{ErrorMonitor, UncaughtError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::PromiseRejectionEvent;

type OnError = dyn Fn(JsValue, JsValue, JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>;

fn line_number(value: &JsValue) -> Option<u32> {
    value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u32)
}

/// The five `onerror` arguments as a core report.
fn uncaught(message: &JsValue, source: &JsValue, line: &JsValue, col: &JsValue, error: &JsValue) -> UncaughtError {
    UncaughtError {
        message: if message.is_undefined() {
            String::new()
        } else {
            string_cast(message)
        },
        source: source.as_string(),
        line: line_number(line),
        col: line_number(col),
        error: error_details(error),
    }
}

/// Chain `onerror` ahead of any previously installed handler.
fn install_onerror(monitor: &ErrorMonitor) -> bool {
    let global = js_sys::global();
    let previous = get_value(&global, "onerror").dyn_into::<Function>().ok();

    let monitor = monitor.clone();
    let receiver = global.clone();
    let handler = Closure::<OnError>::new(move |message: JsValue, source: JsValue, line: JsValue, col: JsValue, error: JsValue| {
        monitor.record_uncaught(&uncaught(&message, &source, &line, &col, &error));
        match &previous {
            Some(previous) => {
                let args = Array::of5(&message, &source, &line, &col, &error);
                previous.apply(&receiver, &args)
            }
            None => Ok(JsValue::UNDEFINED),
        }
    });

    let installed = Reflect::set(&global, &JsValue::from_str("onerror"), handler.as_ref()).unwrap_or(false);
    handler.forget();
    installed
}

/// Listen for unhandled promise rejections.
fn install_rejections(monitor: &ErrorMonitor) -> bool {
    let global = js_sys::global();
    let Some(add) = method(&global, "addEventListener") else {
        return false;
    };

    let monitor = monitor.clone();
    let listener = Closure::<dyn Fn(JsValue)>::new(move |event: JsValue| {
        let reason = event
            .dyn_ref::<PromiseRejectionEvent>()
            .map_or_else(|| get_value(&event, "reason"), PromiseRejectionEvent::reason);
        let stack = error_details(&reason).and_then(|details| details.stack);
        monitor.record_rejection(&capture_value(&reason), stack);
    });

    let added = add
        .call2(&global, &JsValue::from_str("unhandledrejection"), listener.as_ref())
        .is_ok();
    listener.forget();
    added
}

/// Hook uncaught errors and unhandled rejections.
pub fn install(monitor: &ErrorMonitor) -> bool {
    let onerror = install_onerror(monitor);
    let rejections = install_rejections(monitor);
    tracing::debug!(onerror, rejections, "error capture installed");
    onerror || rejections
}
