//! Performance observers feeding the perf monitor.

use super::convert::{get_bool, get_f64, get_string, get_value};
use super::interpose::method;
use js_sys::{Array, Object, Reflect};
use pageprobe_core::perf::{LayoutShift, NavigationTiming, PaintTiming};
use pageprobe_core::PerfMonitor;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{PerformanceObserver, PerformanceObserverEntryList};

/// Minimum event duration reported by event timing (ms).
const EVENT_DURATION_THRESHOLD: f64 = 40.0;

fn supports(entry_type: &str) -> bool {
    let constructor = get_value(&js_sys::global(), "PerformanceObserver");
    let supported = get_value(&constructor, "supportedEntryTypes");
    Array::is_array(&supported) && Array::from(&supported).includes(&JsValue::from_str(entry_type), 0)
}

/// Observe buffered entries of `entry_type`, calling `handler` with each batch.
///
/// Returns `false` when the host does not support the entry type or the
/// observer could not be started; nothing is registered in that case.
pub(crate) fn observe_entries<F>(entry_type: &str, extras: &[(&str, JsValue)], handler: F) -> bool
where
    F: Fn(Array) + 'static,
{
    if !supports(entry_type) {
        tracing::debug!(entry_type, "entry type unsupported");
        return false;
    }

    let callback = Closure::<dyn Fn(JsValue)>::new(move |list: JsValue| {
        if let Some(list) = list.dyn_ref::<PerformanceObserverEntryList>() {
            handler(list.get_entries());
        }
    });
    let Ok(observer) = PerformanceObserver::new(callback.as_ref().unchecked_ref()) else {
        return false;
    };

    let options = Object::new();
    let _ = Reflect::set(&options, &JsValue::from_str("type"), &JsValue::from_str(entry_type));
    let _ = Reflect::set(&options, &JsValue::from_str("buffered"), &JsValue::TRUE);
    for (key, value) in extras {
        let _ = Reflect::set(&options, &JsValue::from_str(key), value);
    }

    let observing = method(&observer, "observe").is_some_and(|observe| observe.call1(&observer, &options).is_ok());
    if observing {
        callback.forget();
    } else {
        tracing::warn!(entry_type, "performance observer rejected options");
    }
    observing
}

fn numbers(entries: &Array, key: &str) -> Vec<f64> {
    entries.iter().filter_map(|entry| get_f64(&entry, key)).collect()
}

/// Start every vitals observer the host supports.
pub fn install(monitor: &PerfMonitor) -> bool {
    let m = monitor.clone();
    let lcp = observe_entries("largest-contentful-paint", &[], move |entries| {
        m.on_largest_paint(&numbers(&entries, "startTime"));
    });

    let m = monitor.clone();
    let cls = observe_entries("layout-shift", &[], move |entries| {
        let shifts: Vec<LayoutShift> = entries
            .iter()
            .map(|entry| LayoutShift {
                value: get_f64(&entry, "value").unwrap_or(0.0),
                had_recent_input: get_bool(&entry, "hadRecentInput").unwrap_or(false),
            })
            .collect();
        m.on_layout_shifts(&shifts);
    });

    let m = monitor.clone();
    let inp = observe_entries(
        "event",
        &[("durationThreshold", JsValue::from_f64(EVENT_DURATION_THRESHOLD))],
        move |entries| {
            m.on_event_timings(&numbers(&entries, "duration"));
        },
    );

    let m = monitor.clone();
    let fcp = observe_entries("paint", &[], move |entries| {
        let paints: Vec<PaintTiming> = entries
            .iter()
            .filter_map(|entry| {
                Some(PaintTiming {
                    name: get_string(&entry, "name")?,
                    start_time: get_f64(&entry, "startTime")?,
                })
            })
            .collect();
        m.on_paints(&paints);
    });

    let m = monitor.clone();
    let ttfb = observe_entries("navigation", &[], move |entries| {
        for entry in entries.iter() {
            if let (Some(request_start), Some(response_start)) =
                (get_f64(&entry, "requestStart"), get_f64(&entry, "responseStart"))
            {
                m.on_navigation(NavigationTiming {
                    request_start,
                    response_start,
                });
            }
        }
    });

    tracing::debug!(lcp, cls, inp, fcp, ttfb, "performance capture installed");
    lcp || cls || inp || fcp || ttfb
}
