//! JS-facing API.
//!
//! One [`Probe`] per page, created on first use. Every `install*` export is
//! guarded so repeated calls leave the page patched exactly once.

use super::clipboard::write_text;
use super::clock::BrowserClock;
use super::convert::{get_string, get_value};
use super::fetch::page_url;
use super::health::BrowserPage;
use super::storage::{Cookies, Storage};
use super::transport::FetchTransport;
use super::{console, errors, fetch, perf, xhr};
use js_sys::{Function, Promise, JSON};
use pageprobe_core::{BugReport, Interceptor, Probe, ProbeConfig, Subscription};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

thread_local! {
    static PROBE: RefCell<Option<Rc<Probe>>> = const { RefCell::new(None) };
}

fn probe_with(config: Option<ProbeConfig>) -> Rc<Probe> {
    PROBE.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(probe) = slot.as_ref() {
            if config.is_some() {
                tracing::warn!("probe already initialized, config ignored");
            }
            return Rc::clone(probe);
        }
        let probe = Rc::new(Probe::new(config.unwrap_or_default(), Rc::new(BrowserClock)));
        *slot = Some(Rc::clone(&probe));
        probe
    })
}

fn probe() -> Rc<Probe> {
    probe_with(None)
}

/// Serialize through JSON so the caller receives plain JS objects.
fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|json| JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL)
}

fn current_url() -> String {
    page_url().unwrap_or_default()
}

/// Zero-argument JS callback as a subscriber.
fn notifier(callback: Function) -> impl Fn() + 'static {
    move || {
        let _ = callback.call0(&JsValue::NULL);
    }
}

/// A JS function that removes `subscription`.
fn unsubscriber(subscription: Subscription) -> JsValue {
    Closure::<dyn Fn()>::new(move || subscription.unsubscribe()).into_js_value()
}

fn install_all(probe: &Probe) {
    install_console_on(probe);
    install_network_on(probe);
    install_errors_on(probe);
    install_performance_on(probe);
    install_health_on(probe);
}

fn install_console_on(probe: &Probe) -> bool {
    probe.claim(Interceptor::Console) && console::install(probe.console())
}

fn install_network_on(probe: &Probe) -> bool {
    if !probe.claim(Interceptor::Network) {
        return false;
    }
    let fetch = fetch::install(probe.network());
    let xhr = xhr::install(probe.network());
    fetch || xhr
}

fn install_errors_on(probe: &Probe) -> bool {
    probe.claim(Interceptor::Errors) && errors::install(probe.errors())
}

fn install_performance_on(probe: &Probe) -> bool {
    probe.claim(Interceptor::Performance) && perf::install(probe.perf())
}

fn install_health_on(probe: &Probe) -> bool {
    probe.health().install(&BrowserPage)
}

// ============================================================================
// Installation
// ============================================================================

/// Install every interceptor with the default configuration.
#[wasm_bindgen]
pub fn install() {
    console_error_panic_hook::set_once();
    install_all(&probe());
}

/// Install every interceptor with a JSON configuration.
///
/// The configuration only applies when the probe has not been created yet.
#[wasm_bindgen(js_name = installWithConfig)]
pub fn install_with_config(json: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let config = ProbeConfig::from_json_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    install_all(&probe_with(Some(config)));
    Ok(())
}

#[wasm_bindgen(js_name = installConsole)]
pub fn install_console() -> bool {
    install_console_on(&probe())
}

#[wasm_bindgen(js_name = installNetwork)]
pub fn install_network() -> bool {
    install_network_on(&probe())
}

#[wasm_bindgen(js_name = installErrors)]
pub fn install_errors() -> bool {
    install_errors_on(&probe())
}

#[wasm_bindgen(js_name = installPerformance)]
pub fn install_performance() -> bool {
    install_performance_on(&probe())
}

#[wasm_bindgen(js_name = installHealth)]
pub fn install_health() -> bool {
    install_health_on(&probe())
}

// ============================================================================
// Entries
// ============================================================================

#[wasm_bindgen(js_name = consoleEntries)]
pub fn console_entries() -> JsValue {
    to_js(&probe().console().entries())
}

#[wasm_bindgen(js_name = networkEntries)]
pub fn network_entries() -> JsValue {
    to_js(&probe().network().entries())
}

#[wasm_bindgen(js_name = errorEntries)]
pub fn error_entries() -> JsValue {
    to_js(&probe().errors().entries())
}

#[wasm_bindgen(js_name = perfEntries)]
pub fn perf_entries() -> JsValue {
    to_js(&probe().perf().entries())
}

#[wasm_bindgen(js_name = healthIssues)]
pub fn health_issues() -> JsValue {
    to_js(&probe().health().entries())
}

/// `{ errors, warnings }` counts of current health issues.
#[wasm_bindgen(js_name = healthSummary)]
pub fn health_summary() -> JsValue {
    to_js(&probe().health().summary())
}

#[wasm_bindgen(js_name = clearConsole)]
pub fn clear_console() {
    probe().console().clear();
}

#[wasm_bindgen(js_name = clearNetwork)]
pub fn clear_network() {
    probe().network().clear();
}

#[wasm_bindgen(js_name = clearErrors)]
pub fn clear_errors() {
    probe().errors().clear();
}

#[wasm_bindgen(js_name = clearPerf)]
pub fn clear_perf() {
    probe().perf().clear();
}

#[wasm_bindgen(js_name = clearHealth)]
pub fn clear_health() {
    probe().health().clear();
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Call `callback` after every console change. Returns the unsubscribe function.
#[wasm_bindgen(js_name = subscribeConsole)]
pub fn subscribe_console(callback: Function) -> JsValue {
    unsubscriber(probe().console().subscribe(notifier(callback)))
}

#[wasm_bindgen(js_name = subscribeNetwork)]
pub fn subscribe_network(callback: Function) -> JsValue {
    unsubscriber(probe().network().subscribe(notifier(callback)))
}

#[wasm_bindgen(js_name = subscribeErrors)]
pub fn subscribe_errors(callback: Function) -> JsValue {
    unsubscriber(probe().errors().subscribe(notifier(callback)))
}

#[wasm_bindgen(js_name = subscribePerf)]
pub fn subscribe_perf(callback: Function) -> JsValue {
    unsubscriber(probe().perf().subscribe(notifier(callback)))
}

#[wasm_bindgen(js_name = subscribeHealth)]
pub fn subscribe_health(callback: Function) -> JsValue {
    unsubscriber(probe().health().subscribe(notifier(callback)))
}

/// Call `callback(entry)` with every new perf entry.
#[wasm_bindgen(js_name = onPerfEntry)]
pub fn on_perf_entry(callback: Function) -> JsValue {
    let subscription = probe().perf().listen(move |entry| {
        let _ = callback.call1(&JsValue::NULL, &to_js(entry));
    });
    unsubscriber(subscription)
}

/// Set (or with `null`, remove) the single latest-error callback.
#[wasm_bindgen(js_name = onLatestError)]
pub fn on_latest_error(callback: Option<Function>) {
    let probe = probe();
    match callback {
        Some(callback) => probe.errors().on_latest_error(move |entry| {
            let _ = callback.call1(&JsValue::NULL, &to_js(entry));
        }),
        None => probe.errors().clear_latest_error_callback(),
    }
}

// ============================================================================
// Storage and reports
// ============================================================================

/// Snapshot both page stores and the cookies.
#[wasm_bindgen(js_name = captureStorage)]
pub fn capture_storage() -> JsValue {
    let snapshot = probe()
        .storage()
        .capture(&Storage::local(), &Storage::session(), &Cookies::new());
    to_js(&snapshot)
}

#[wasm_bindgen(js_name = buildReport)]
pub fn build_report() -> String {
    probe().report(&current_url())
}

/// Copy the report to the clipboard. Resolves `false` on failure.
#[wasm_bindgen(js_name = copyReport)]
pub fn copy_report() -> Promise {
    let report = build_report();
    future_to_promise(async move { Ok(JsValue::from_bool(write_text(&report).await)) })
}

/// Upload the report and every entry to the configured backend.
#[wasm_bindgen(js_name = submitReport)]
pub fn submit_report() -> Promise {
    let probe = probe();
    let upload = probe.upload(&current_url());
    let client = probe.api_client(FetchTransport);
    future_to_promise(async move {
        let client = client.map_err(|e| JsValue::from_str(&e.to_string()))?;
        let reply = client
            .submit_report(&upload)
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(to_js(&reply))
    })
}

/// File a bug with the current report attached.
#[wasm_bindgen(js_name = submitBug)]
pub fn submit_bug(title: String, description: String) -> Promise {
    let probe = probe();
    let page_url = current_url();
    let bug = BugReport {
        title,
        description,
        report: Some(probe.report(&page_url)),
        user_agent: get_string(&get_value(&js_sys::global(), "navigator"), "userAgent"),
        page_url,
    };
    let client = probe.api_client(FetchTransport);
    future_to_promise(async move {
        let client = client.map_err(|e| JsValue::from_str(&e.to_string()))?;
        let reply = client
            .submit_bug(&bug)
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(to_js(&reply))
    })
}
