//! Backend transport over the page's unpatched `fetch`.

use super::fetch::unpatched_fetch;
use js_sys::{Object, Promise, Reflect};
use pageprobe_core::{OutboundRequest, OutboundResponse, Transport, TransportError};
use std::future::Future;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

/// Issues backend requests without them showing up in network capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchTransport;

fn network_error(err: &JsValue) -> TransportError {
    TransportError::Network(super::convert::string_cast(err))
}

fn init_of(request: &OutboundRequest) -> Result<Object, JsValue> {
    let headers = Object::new();
    for (name, value) in &request.headers {
        Reflect::set(&headers, &JsValue::from_str(name), &JsValue::from_str(value))?;
    }
    let init = Object::new();
    Reflect::set(&init, &JsValue::from_str("method"), &JsValue::from_str(&request.method))?;
    Reflect::set(&init, &JsValue::from_str("headers"), &headers)?;
    if let Some(body) = &request.body {
        Reflect::set(&init, &JsValue::from_str("body"), &JsValue::from_str(body))?;
    }
    Ok(init)
}

async fn send(request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
    let fetch = unpatched_fetch().ok_or(TransportError::Unavailable)?;
    let init = init_of(&request).map_err(|e| network_error(&e))?;

    let issued = fetch
        .call2(&js_sys::global(), &JsValue::from_str(&request.url), &init)
        .map_err(|e| network_error(&e))?;
    let response: Response = JsFuture::from(Promise::resolve(&issued))
        .await
        .map_err(|e| network_error(&e))?
        .dyn_into()
        .map_err(|e| network_error(&e))?;

    let text = JsFuture::from(response.text().map_err(|e| network_error(&e))?)
        .await
        .map_err(|e| network_error(&e))?;
    Ok(OutboundResponse {
        status: response.status(),
        body: text.as_string().unwrap_or_default(),
    })
}

impl Transport for FetchTransport {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<OutboundResponse, TransportError>> {
        send(request)
    }
}
