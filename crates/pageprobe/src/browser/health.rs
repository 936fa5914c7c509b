//! The live page as a [`PageSurface`].

use super::convert::{get_f64, get_string, get_value};
use super::interpose::method;
use super::perf::observe_entries;
use pageprobe_core::health::{ImageInfo, PageSurface, PolicyViolation, ResourceTiming};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlImageElement, SecurityPolicyViolationEvent};

/// Image elements, policy events and resource timing of the current document.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPage;

impl BrowserPage {
    fn image_info(image: &HtmlImageElement) -> ImageInfo {
        ImageInfo {
            src: image.src(),
            natural_width: image.natural_width(),
            natural_height: image.natural_height(),
            complete: image.complete(),
            alt: image.get_attribute("alt"),
        }
    }
}

impl PageSurface for BrowserPage {
    fn images(&self) -> Vec<ImageInfo> {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return Vec::new();
        };
        let images = document.images();
        (0..images.length())
            .filter_map(|i| images.item(i))
            .filter_map(|element| element.dyn_into::<HtmlImageElement>().ok())
            .map(|image| Self::image_info(&image))
            .collect()
    }

    fn on_policy_violation(&self, handler: Box<dyn Fn(PolicyViolation)>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let listener = Closure::<dyn Fn(JsValue)>::new(move |event: JsValue| {
            let violation = match event.dyn_ref::<SecurityPolicyViolationEvent>() {
                Some(event) => PolicyViolation {
                    blocked_uri: event.blocked_uri(),
                    violated_directive: event.violated_directive(),
                    source_file: Some(event.source_file()).filter(|s| !s.is_empty()),
                },
                None => PolicyViolation {
                    blocked_uri: get_string(&event, "blockedURI").unwrap_or_default(),
                    violated_directive: get_string(&event, "violatedDirective").unwrap_or_default(),
                    source_file: get_string(&event, "sourceFile"),
                },
            };
            handler(violation);
        });

        let target: &JsValue = document.as_ref();
        let added = method(target, "addEventListener").is_some_and(|add| {
            add.call2(target, &JsValue::from_str("securitypolicyviolation"), listener.as_ref())
                .is_ok()
        });
        listener.forget();
        if !added {
            tracing::warn!("could not listen for policy violations");
        }
    }

    fn on_resource_timing(&self, handler: Box<dyn Fn(ResourceTiming)>) {
        observe_entries("resource", &[], move |entries| {
            for entry in entries.iter() {
                handler(ResourceTiming {
                    name: get_string(&entry, "name").unwrap_or_default(),
                    duration: get_f64(&entry, "duration").unwrap_or(0.0),
                    initiator_type: get_value(&entry, "initiatorType").as_string().unwrap_or_default(),
                });
            }
        });
    }
}
