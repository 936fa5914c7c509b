//! Conversion of arbitrary JS values into core types.
//!
//! Nothing here throws or panics: every shape the page can pass ends up as
//! some core value, falling back to a string cast or an `Unknown` variant.

use js_sys::{Array, ArrayBuffer, Function, Object, Reflect, JSON};
use pageprobe_core::network::{BodyShape, FormPart, HeaderShape};
use pageprobe_core::{CapturedValue, ErrorDetails};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, FormData, Headers, UrlSearchParams};

/// `String(value)`, as the host would render it.
pub(crate) fn string_cast(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    Reflect::get(&js_sys::global(), &JsValue::from_str("String"))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .and_then(|string| string.call1(&JsValue::UNDEFINED, value).ok())
        .and_then(|s| s.as_string())
        .unwrap_or_else(|| "[object]".to_string())
}

fn get(target: &JsValue, key: &str) -> JsValue {
    if !target.is_object() && !target.is_function() {
        return JsValue::UNDEFINED;
    }
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

/// String property, if present and a string.
pub(crate) fn get_string(target: &JsValue, key: &str) -> Option<String> {
    get(target, key).as_string()
}

/// Number property, if present and a number.
pub(crate) fn get_f64(target: &JsValue, key: &str) -> Option<f64> {
    get(target, key).as_f64()
}

/// Boolean property, if present and a boolean.
pub(crate) fn get_bool(target: &JsValue, key: &str) -> Option<bool> {
    get(target, key).as_bool()
}

/// Any property, `undefined` when unreadable.
pub(crate) fn get_value(target: &JsValue, key: &str) -> JsValue {
    get(target, key)
}

/// Model one JS value.
pub fn capture_value(value: &JsValue) -> CapturedValue {
    if value.is_null() {
        return CapturedValue::Null;
    }
    if value.is_undefined() {
        return CapturedValue::Undefined;
    }
    if let Some(b) = value.as_bool() {
        return CapturedValue::Bool(b);
    }
    if let Some(n) = value.as_f64() {
        return CapturedValue::Number(n);
    }
    if let Some(s) = value.as_string() {
        return CapturedValue::String(s);
    }
    if value.is_bigint() {
        return CapturedValue::BigInt(string_cast(value));
    }
    if value.is_symbol() {
        let cast = string_cast(value);
        let description = cast
            .strip_prefix("Symbol(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(&cast)
            .to_string();
        return CapturedValue::Symbol(description);
    }
    if value.is_function() {
        return CapturedValue::Function(get_string(value, "name").filter(|n| !n.is_empty()));
    }
    if let Some(details) = error_details(value) {
        return CapturedValue::Error {
            name: details.name,
            message: details.message,
        };
    }

    match JSON::stringify(value).ok().and_then(|json| JsValue::from(json).as_string()) {
        Some(json) => serde_json::from_str(&json)
            .map_or_else(|_| CapturedValue::Opaque(string_cast(value)), CapturedValue::Structured),
        None => CapturedValue::Opaque(string_cast(value)),
    }
}

/// Model every element of an argument list.
pub fn capture_args(args: &Array) -> Vec<CapturedValue> {
    args.iter().map(|arg| capture_value(&arg)).collect()
}

/// `Object.prototype.toString.call(value)`, e.g. `"[object Error]"`.
fn builtin_tag(value: &JsValue) -> Option<String> {
    let prototype = get(&get(&js_sys::global(), "Object"), "prototype");
    get(&prototype, "toString")
        .dyn_into::<Function>()
        .ok()?
        .call0(value)
        .ok()?
        .as_string()
}

/// Name, message and stack of an error-like value.
///
/// Besides local `Error` instances this accepts errors from other realms
/// (frames) and plain objects carrying a string `message` together with a
/// string `name` or `stack`.
pub fn error_details(value: &JsValue) -> Option<ErrorDetails> {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return Some(ErrorDetails {
            name: String::from(error.name()),
            message: String::from(error.message()),
            stack: get_string(value, "stack"),
        });
    }
    if !value.is_object() {
        return None;
    }
    let message = get_string(value, "message")?;
    let name = get_string(value, "name");
    let stack = get_string(value, "stack");
    let branded = builtin_tag(value).as_deref() == Some("[object Error]");
    if !branded && name.is_none() && stack.is_none() {
        return None;
    }
    Some(ErrorDetails {
        name: name.unwrap_or_else(|| "Error".to_string()),
        message,
        stack,
    })
}

/// Entries of any iterable as `[key, value]` pairs.
fn iter_pairs(iterable: &JsValue) -> Vec<(JsValue, JsValue)> {
    let Ok(Some(iter)) = js_sys::try_iter(iterable) else {
        return Vec::new();
    };
    iter.filter_map(Result::ok)
        .filter_map(|entry| entry.dyn_into::<Array>().ok())
        .filter(|pair| pair.length() >= 2)
        .map(|pair| (pair.get(0), pair.get(1)))
        .collect()
}

/// Classify a header set.
pub fn header_shape(value: &JsValue) -> HeaderShape {
    if value.is_null() || value.is_undefined() {
        return HeaderShape::None;
    }
    if value.is_instance_of::<Headers>() {
        return HeaderShape::Headers(
            iter_pairs(value)
                .into_iter()
                .map(|(name, value)| (string_cast(&name), string_cast(&value)))
                .collect(),
        );
    }
    if Array::is_array(value) {
        let pairs = Array::from(value)
            .iter()
            .filter_map(|pair| pair.dyn_into::<Array>().ok())
            .map(|pair| pair.iter().map(|part| string_cast(&part)).collect())
            .collect();
        return HeaderShape::Pairs(pairs);
    }
    if value.is_object() {
        let Some(object) = value.dyn_ref::<Object>() else {
            return HeaderShape::Unknown;
        };
        let entries = Object::entries(object)
            .iter()
            .filter_map(|entry| entry.dyn_into::<Array>().ok())
            .map(|pair| (string_cast(&pair.get(0)), pair.get(1).as_string()))
            .collect();
        return HeaderShape::Map(entries);
    }
    HeaderShape::Unknown
}

/// Classify a request body.
pub fn body_shape(value: &JsValue) -> BodyShape {
    if value.is_null() || value.is_undefined() {
        return BodyShape::None;
    }
    if let Some(text) = value.as_string() {
        return BodyShape::Text(text);
    }
    if let Some(blob) = value.dyn_ref::<Blob>() {
        return BodyShape::Blob {
            size: blob.size() as u64,
        };
    }
    if let Some(buffer) = value.dyn_ref::<ArrayBuffer>() {
        return BodyShape::Buffer {
            byte_length: u64::from(buffer.byte_length()),
        };
    }
    if ArrayBuffer::is_view(value) {
        return BodyShape::Buffer {
            byte_length: get_f64(value, "byteLength").unwrap_or(0.0) as u64,
        };
    }
    if value.is_instance_of::<FormData>() {
        let parts = iter_pairs(value)
            .into_iter()
            .map(|(name, part)| {
                let name = string_cast(&name);
                match part.dyn_ref::<Blob>() {
                    Some(blob) => FormPart::Blob {
                        name,
                        size: blob.size() as u64,
                    },
                    None => FormPart::Text {
                        name,
                        value: string_cast(&part),
                    },
                }
            })
            .collect();
        return BodyShape::FormData(parts);
    }
    if let Some(params) = value.dyn_ref::<UrlSearchParams>() {
        return BodyShape::UrlSearchParams(String::from(params.to_string()));
    }
    BodyShape::Unknown
}
