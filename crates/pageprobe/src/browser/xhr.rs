//! `XMLHttpRequest` patching.
//!
//! Each XHR object is tagged with its own [`XhrHandle`] under a registered
//! symbol; metadata lives in the monitor's tracker keyed by that handle.
//! Only sends the native call will accept reach the in-flight table, so every
//! tracked call gets its `loadend`.

use super::convert::{body_shape, get_value, string_cast};
use super::fetch::page_url;
use super::interpose::{method, patch};
use js_sys::{Array, ArrayBuffer, Object, Reflect, Symbol, JSON};
use pageprobe_core::network::{ResponseBody, XhrCompletion};
use pageprobe_core::{NetworkMonitor, XhrHandle};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Blob, XmlHttpRequest, XmlHttpRequestResponseType};

const HANDLE_SYMBOL: &str = "pageprobe.xhr";

fn handle_key() -> JsValue {
    Symbol::for_(HANDLE_SYMBOL).into()
}

/// The handle tagged on `xhr`, allocating one on first use.
fn handle_of(xhr: &JsValue, monitor: &NetworkMonitor) -> Option<XhrHandle> {
    if !xhr.is_object() {
        return None;
    }
    let key = handle_key();
    if let Some(raw) = Reflect::get(xhr, &key).ok().and_then(|v| v.as_f64()) {
        return Some(XhrHandle::from_raw(raw as u64));
    }
    let handle = monitor.xhr().allocate();
    Reflect::set(xhr, &key, &JsValue::from_f64(handle.as_u64() as f64)).ok()?;
    Some(handle)
}

fn arg_string(args: &Array, index: u32) -> String {
    let value = args.get(index);
    if value.is_undefined() {
        String::new()
    } else {
        string_cast(&value)
    }
}

/// Everything readable from a finished XHR.
fn completion_of(xhr: &JsValue) -> XhrCompletion {
    let Some(xhr) = xhr.dyn_ref::<XmlHttpRequest>() else {
        return XhrCompletion::default();
    };
    XhrCompletion {
        status: xhr.status().unwrap_or(0),
        status_text: xhr.status_text().unwrap_or_default(),
        raw_headers: xhr.get_all_response_headers().unwrap_or_default(),
        response: response_body(xhr),
    }
}

fn response_body(xhr: &XmlHttpRequest) -> ResponseBody {
    match xhr.response_type() {
        XmlHttpRequestResponseType::None | XmlHttpRequestResponseType::Text => xhr
            .response_text()
            .ok()
            .flatten()
            .map_or(ResponseBody::Empty, ResponseBody::Text),
        XmlHttpRequestResponseType::Arraybuffer => match xhr.response() {
            Ok(value) => value.dyn_ref::<ArrayBuffer>().map_or(ResponseBody::Empty, |b| {
                ResponseBody::ArrayBuffer {
                    byte_length: u64::from(b.byte_length()),
                }
            }),
            Err(_) => ResponseBody::Unknown,
        },
        XmlHttpRequestResponseType::Blob => match xhr.response() {
            Ok(value) => value.dyn_ref::<Blob>().map_or(ResponseBody::Empty, |b| ResponseBody::Blob {
                size: b.size() as u64,
            }),
            Err(_) => ResponseBody::Unknown,
        },
        XmlHttpRequestResponseType::Json => xhr
            .response()
            .ok()
            .filter(|v| !v.is_null() && !v.is_undefined())
            .and_then(|v| JSON::stringify(&v).ok())
            .and_then(|json| JsValue::from(json).as_string())
            .and_then(|json| serde_json::from_str(&json).ok())
            .map_or(ResponseBody::Empty, ResponseBody::Json),
        XmlHttpRequestResponseType::Document => ResponseBody::Document,
        _ => ResponseBody::Unknown,
    }
}

/// Listen for the call's single completion event.
fn on_loadend(xhr: &JsValue, handle: XhrHandle, monitor: NetworkMonitor) {
    let Some(add) = method(xhr, "addEventListener") else {
        return;
    };
    let target = xhr.clone();
    let listener = Closure::once_into_js(move || {
        monitor.xhr().complete(handle, completion_of(&target));
    });
    let options = Object::new();
    let _ = Reflect::set(&options, &JsValue::from_str("once"), &JsValue::TRUE);
    if add
        .call3(xhr, &JsValue::from_str("loadend"), &listener, &options)
        .is_err()
    {
        tracing::warn!("could not listen for XHR completion");
    }
}

/// Patch `open`, `setRequestHeader` and `send` on the XHR prototype.
pub fn install(monitor: &NetworkMonitor) -> bool {
    let constructor = get_value(&js_sys::global(), "XMLHttpRequest");
    let prototype = get_value(&constructor, "prototype");
    if !prototype.is_object() {
        tracing::debug!("no XMLHttpRequest, XHR capture skipped");
        return false;
    }

    let m = monitor.clone();
    let open = patch(&prototype, "open", move |xhr: JsValue, args: Array| {
        if let Some(handle) = handle_of(&xhr, &m) {
            m.set_base_url(page_url());
            m.xhr().open(handle, &arg_string(&args, 0), &arg_string(&args, 1));
        }
    });

    let m = monitor.clone();
    let set_header = patch(&prototype, "setRequestHeader", move |xhr: JsValue, args: Array| {
        if let Some(handle) = handle_of(&xhr, &m) {
            m.xhr().set_header(handle, &arg_string(&args, 0), &arg_string(&args, 1));
        }
    });

    let m = monitor.clone();
    let send = patch(&prototype, "send", move |xhr: JsValue, args: Array| {
        // Native send throws unless the call is opened and not yet sent.
        let accepted = xhr
            .dyn_ref::<XmlHttpRequest>()
            .is_some_and(|x| x.ready_state() == XmlHttpRequest::OPENED);
        if !accepted {
            return;
        }
        if let Some(handle) = handle_of(&xhr, &m) {
            if m.xhr().send(handle, &body_shape(&args.get(0))) {
                on_loadend(&xhr, handle, m.clone());
            }
        }
    });

    tracing::debug!(open, set_header, send, "XHR capture installed");
    open && send
}
