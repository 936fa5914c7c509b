//! Patching of host functions.

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[wasm_bindgen(module = "/js/interpose.js")]
extern "C" {
    fn interpose(hook: &JsValue, original: &Function) -> Function;
}

/// Function property `name` of `target`, if it is callable.
pub(crate) fn method(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
}

/// Replace `target[name]` with a wrapper that calls `hook(this, args)` and
/// then the original with the unmodified receiver and arguments.
///
/// Returns `false` (leaving `target` untouched) when there is nothing
/// callable to wrap.
pub(crate) fn patch<F>(target: &JsValue, name: &str, hook: F) -> bool
where
    F: Fn(JsValue, Array) + 'static,
{
    let Some(original) = method(target, name) else {
        tracing::debug!(name, "nothing to patch");
        return false;
    };

    let hook = Closure::<dyn Fn(JsValue, Array)>::new(hook);
    let wrapper = interpose(hook.as_ref(), &original);
    // Lives as long as the patched global.
    hook.forget();

    match Reflect::set(target, &JsValue::from_str(name), &wrapper) {
        Ok(true) => true,
        _ => {
            tracing::warn!(name, "patched function could not be assigned");
            false
        }
    }
}
