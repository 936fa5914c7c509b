//! `fetch` patching.

use super::convert::{body_shape, get_string, get_value, header_shape, string_cast};
use super::interpose::method;
use js_sys::{Function, Promise, Reflect};
use pageprobe_core::network::HeaderMap;
use pageprobe_core::{FetchRequest, NetworkMonitor, ObservedResponse, RequestInput};
use std::cell::RefCell;
use std::future::Future;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{Blob, Request, Response};

thread_local! {
    static ORIGINAL_FETCH: RefCell<Option<Function>> = const { RefCell::new(None) };
}

/// The page's `fetch` as it was before patching (or the current one when
/// capture is not installed). Requests issued through it are not captured.
pub fn unpatched_fetch() -> Option<Function> {
    ORIGINAL_FETCH
        .with(|slot| slot.borrow().clone())
        .or_else(|| method(&js_sys::global(), "fetch"))
}

/// Current page URL, used to resolve relative request URLs.
pub(crate) fn page_url() -> Option<String> {
    get_string(&get_value(&js_sys::global(), "location"), "href")
}

/// Describe the arguments of one `fetch(input, init)` call.
pub fn describe_request(input: &JsValue, init: &JsValue) -> FetchRequest {
    let input = if let Some(request) = input.dyn_ref::<Request>() {
        RequestInput::Request {
            url: request.url(),
            method: Some(request.method()),
            headers: header_shape(request.headers().as_ref()),
        }
    } else if input.is_instance_of::<web_sys::Url>() {
        RequestInput::UrlObject(get_string(input, "href").unwrap_or_else(|| string_cast(input)))
    } else {
        RequestInput::Url(string_cast(input))
    };

    FetchRequest {
        input,
        method: get_string(init, "method"),
        headers: header_shape(&get_value(init, "headers")),
        body: body_shape(&get_value(init, "body")),
    }
}

/// A resolved `fetch` value.
struct ObservedFetch(JsValue);

impl ObservedFetch {
    fn response(&self) -> Option<&Response> {
        self.0.dyn_ref::<Response>()
    }
}

impl ObservedResponse for ObservedFetch {
    fn status(&self) -> u16 {
        self.response().map_or(0, Response::status)
    }

    fn status_text(&self) -> String {
        self.response().map(Response::status_text).unwrap_or_default()
    }

    fn headers(&self) -> HeaderMap {
        self.response()
            .map(|r| pageprobe_core::network::normalize_headers(&header_shape(r.headers().as_ref())))
            .unwrap_or_default()
    }

    fn body_size(&self) -> impl Future<Output = Option<u64>> + 'static {
        // Read from a copy so the caller's body stays unconsumed.
        let copy = self.response().and_then(|r| r.clone().ok());
        async move {
            let blob = JsFuture::from(copy?.blob().ok()?).await.ok()?;
            Some(blob.dyn_into::<Blob>().ok()?.size() as u64)
        }
    }
}

/// Replace the global `fetch` with a capturing wrapper.
pub fn install(monitor: &NetworkMonitor) -> bool {
    let global = js_sys::global();
    let Some(original) = method(&global, "fetch") else {
        tracing::debug!("no fetch, fetch capture skipped");
        return false;
    };
    ORIGINAL_FETCH.with(|slot| *slot.borrow_mut() = Some(original.clone()));

    let monitor = monitor.clone();
    let receiver = global.clone();
    let hook = Closure::<dyn Fn(JsValue, JsValue) -> Result<Promise, JsValue>>::new(
        move |input: JsValue, init: JsValue| {
            monitor.set_base_url(page_url());
            let pending = monitor.begin_fetch(&describe_request(&input, &init));

            let issued = match original.call2(&receiver, &input, &init) {
                Ok(issued) => issued,
                Err(err) => {
                    pending.fail();
                    return Err(err);
                }
            };
            let call = JsFuture::from(Promise::resolve(&issued));

            Ok(future_to_promise(async move {
                let (result, sizing) = pending.settle(call.await.map(ObservedFetch));
                if let Some(sizing) = sizing {
                    spawn_local(async move {
                        sizing.run().await;
                    });
                }
                result.map(|observed| observed.0)
            }))
        },
    );

    let installed = Reflect::set(&global, &JsValue::from_str("fetch"), hook.as_ref()).unwrap_or(false);
    hook.forget();
    tracing::debug!(installed, "fetch capture installed");
    installed
}
