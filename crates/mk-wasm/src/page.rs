//! Page-realm side: the override interpreter over a real window, the
//! frame watcher, and script delivery into the page.

use std::rc::Rc;

use log::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Blob, BlobPropertyBag, Document, Element, HtmlScriptElement, MutationObserver, MutationObserverInit,
    MutationRecord, Url,
};

use mk_core::error::InjectError;
use mk_core::inject::{apply_overrides, InjectionPayload, PageRealm, PageValue, ScriptSink, WINDOW_TARGET};
use mk_core::LOG_TARGET;

use crate::convert::{describe, json_to_js};

/// The fixed runtime that interprets a payload inside the page realm.
pub const PAGE_RUNTIME: &str = include_str!("page_runtime.js");

/// Attribute carrying the payload JSON on the injected script element.
pub const PAYLOAD_ATTR: &str = "data-mockify-payload";

/// Attribute the runtime sets on its own element once it has run.
pub const APPLIED_ATTR: &str = "data-mockify-applied";

// =============================================================================
// Realm
// =============================================================================

/// `PageRealm` over a JS global object (a window or a frame's window).
pub struct WindowRealm {
    global: JsValue,
}

impl WindowRealm {
    pub fn new(global: JsValue) -> Self {
        Self { global }
    }

    fn resolve(&self, path: &[&str]) -> Result<js_sys::Object, InjectError> {
        let mut current = self.global.clone();
        for segment in path {
            current = js_sys::Reflect::get(&current, &JsValue::from_str(segment))
                .map_err(|_| InjectError::MissingTarget(path.join(".")))?;
            if !(current.is_object() || current.is_function()) {
                return Err(InjectError::MissingTarget(path.join(".")));
            }
        }
        Ok(current.unchecked_into())
    }

    fn redefine(&self, target: &js_sys::Object, label: &str, property: &str, value: &JsValue) -> Result<(), InjectError> {
        let fail = |reason: String| InjectError::Define {
            target: label.to_string(),
            property: property.to_string(),
            reason,
        };

        let descriptor = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&descriptor, &"configurable".into(), &JsValue::TRUE);
        let _ = js_sys::Reflect::set(&descriptor, &"value".into(), value);

        match js_sys::Reflect::define_property(target, &JsValue::from_str(property), &descriptor) {
            Ok(true) => Ok(()),
            Ok(false) => Err(fail("property is not configurable".to_string())),
            Err(e) => Err(fail(describe(&e))),
        }
    }
}

fn page_value(value: PageValue<'_>) -> Result<JsValue, String> {
    match value {
        PageValue::Undefined => Ok(JsValue::UNDEFINED),
        PageValue::Json(v) => json_to_js(v),
    }
}

impl PageRealm for WindowRealm {
    fn assign_global(&mut self, property: &str, value: PageValue<'_>) -> Result<(), InjectError> {
        let fail = |reason: String| InjectError::Define {
            target: WINDOW_TARGET.to_string(),
            property: property.to_string(),
            reason,
        };
        let value = page_value(value).map_err(fail)?;
        js_sys::Reflect::set(&self.global, &JsValue::from_str(property), &value)
            .map_err(|e| fail(describe(&e)))?;
        Ok(())
    }

    fn define(&mut self, path: &[&str], property: &str, value: PageValue<'_>) -> Result<(), InjectError> {
        let label = path.join(".");
        let target = self.resolve(path)?;
        let value = page_value(value).map_err(|reason| InjectError::Define {
            target: label.clone(),
            property: property.to_string(),
            reason,
        })?;
        self.redefine(&target, &label, property, &value)
    }

    fn set_timezone_offset(&mut self, minutes: i32) -> Result<(), InjectError> {
        let prototype = self.resolve(&["Date", "prototype"])?;
        let getter = Closure::<dyn Fn() -> i32>::new(move || minutes).into_js_value();
        self.redefine(&prototype, "Date.prototype", "getTimezoneOffset", &getter)
    }
}

// =============================================================================
// Frame watcher
// =============================================================================

/// Elements that can host a nested browsing context.
const FRAME_SELECTOR: &str = "iframe,frame,object,embed";

/// The nested window behind `node`, when it has one with a navigator.
fn nested_window(node: &JsValue) -> Option<JsValue> {
    let window = js_sys::Reflect::get(node, &"contentWindow".into()).ok()?;
    if !window.is_object() {
        return None;
    }
    let navigator = js_sys::Reflect::get(&window, &"navigator".into()).ok()?;
    navigator.is_object().then_some(window)
}

fn apply_to_frame(node: &JsValue, payload: &InjectionPayload) {
    let Some(window) = nested_window(node) else {
        return;
    };
    let mut realm = WindowRealm::new(window);
    let report = apply_overrides(&mut realm, payload);
    if payload.debug {
        debug!(target: LOG_TARGET, "Frame overrides: {} applied, {} failed", report.applied, report.failed);
    }
}

/// Apply `payload` to `node` and to every frame-like element beneath it.
pub fn apply_to_subtree(node: JsValue, payload: &InjectionPayload) {
    apply_to_frame(&node, payload);
    let Some(element) = node.dyn_ref::<Element>() else {
        return;
    };
    let Ok(frames) = element.query_selector_all(FRAME_SELECTOR) else {
        return;
    };
    for i in 0..frames.length() {
        if let Some(frame) = frames.item(i) {
            apply_to_frame(&frame.into(), payload);
        }
    }
}

/// Re-apply `payload` to every frame added under `document` from now on.
/// The observer lives as long as the document.
pub fn watch_frames(document: &Document, payload: Rc<InjectionPayload>) -> Result<MutationObserver, JsValue> {
    let root = document
        .document_element()
        .ok_or_else(|| JsValue::from_str("Document has no root element"))?;

    let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
        move |records: js_sys::Array, _observer: MutationObserver| {
            for record in records.iter() {
                let record: MutationRecord = record.unchecked_into();
                let added = record.added_nodes();
                for i in 0..added.length() {
                    if let Some(node) = added.item(i) {
                        apply_to_subtree(node.into(), &payload);
                    }
                }
            }
        },
    );

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let options = MutationObserverInit::new();
    options.set_child_list(true);
    options.set_subtree(true);
    observer.observe_with_options(&root, &options)?;
    callback.forget();

    Ok(observer)
}

// =============================================================================
// Delivery
// =============================================================================

/// Delivers the runtime and payload through `<script>` elements.
pub struct DomScriptSink {
    document: Document,
}

impl DomScriptSink {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn script(&self, payload_json: &str) -> Result<HtmlScriptElement, JsValue> {
        let script: HtmlScriptElement = self.document.create_element("script")?.dyn_into()?;
        script.set_attribute(PAYLOAD_ATTR, payload_json)?;
        Ok(script)
    }

    fn parent(&self) -> Result<Element, JsValue> {
        self.document
            .head()
            .map(Element::from)
            .or_else(|| self.document.document_element())
            .ok_or_else(|| JsValue::from_str("Document has no root element"))
    }
}

impl ScriptSink for DomScriptSink {
    fn append_inline(&mut self, payload_json: &str) -> Result<(), InjectError> {
        let blocked = |e: JsValue| InjectError::InlineBlocked(describe(&e));

        let script = self.script(payload_json).map_err(blocked)?;
        script.set_text(PAGE_RUNTIME).map_err(blocked)?;
        self.parent().map_err(blocked)?.append_child(&script).map_err(blocked)?;

        // Inline scripts run synchronously on insertion unless policy forbids it.
        let applied = script.has_attribute(APPLIED_ATTR);
        script.remove();

        if applied {
            Ok(())
        } else {
            Err(InjectError::InlineBlocked("runtime did not execute".to_string()))
        }
    }

    fn append_blob(&mut self, payload_json: &str) -> Result<(), InjectError> {
        let blocked = |e: JsValue| InjectError::BlobBlocked(describe(&e));

        let parts = js_sys::Array::of1(&JsValue::from_str(PAGE_RUNTIME));
        let bag = BlobPropertyBag::new();
        bag.set_type("text/javascript");
        let blob = Blob::new_with_str_sequence_and_options(&parts, &bag).map_err(blocked)?;
        let url = Url::create_object_url_with_blob(&blob).map_err(blocked)?;

        let script = self.script(payload_json).map_err(blocked)?;
        script.set_src(&url);

        let loaded = script.clone();
        let onload = Closure::once_into_js(move || {
            let _ = Url::revoke_object_url(&url);
            loaded.remove();
        });
        script.set_onload(Some(onload.unchecked_ref()));

        self.parent().map_err(blocked)?.append_child(&script).map_err(blocked)?;
        Ok(())
    }
}
