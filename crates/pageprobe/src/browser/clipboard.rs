//! Clipboard writes.

use super::convert::get_value;
use super::interpose::method;
use js_sys::Promise;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Put `text` on the system clipboard. Resolves `false` when the clipboard
/// is missing or the write is refused.
pub async fn write_text(text: &str) -> bool {
    let navigator = get_value(&js_sys::global(), "navigator");
    let clipboard = get_value(&navigator, "clipboard");
    let Some(write) = method(&clipboard, "writeText") else {
        tracing::debug!("no clipboard");
        return false;
    };
    let Ok(pending) = write.call1(&clipboard, &JsValue::from_str(text)) else {
        return false;
    };
    match JsFuture::from(Promise::resolve(&pending)).await {
        Ok(_) => true,
        Err(_) => {
            tracing::debug!("clipboard write refused");
            false
        }
    }
}
