//! Interception host backed by a JS bridge object.
//!
//! The bridge exposes `install(spec)` and `remove(id)`. `install` receives
//! `{ id, event, urls, types, extraInfoSpec }` and is expected to add a
//! listener on `event` that forwards to the matching `on_*` export.

use wasm_bindgen::{JsCast, JsValue};

use mk_core::error::HostError;
use mk_core::{HookId, HookSpec, InterceptionHost};

use crate::convert::describe;

pub struct JsInterceptionHost {
    bridge: JsValue,
}

impl JsInterceptionHost {
    pub fn new(bridge: JsValue) -> Self {
        Self { bridge }
    }

    fn call(&self, method: &str, arg: &JsValue) -> Result<(), String> {
        let function = js_sys::Reflect::get(&self.bridge, &method.into())
            .map_err(|e| describe(&e))?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| format!("bridge.{} is not a function", method))?;
        function.call1(&self.bridge, arg).map_err(|e| describe(&e))?;
        Ok(())
    }
}

fn spec_to_js(spec: &HookSpec) -> JsValue {
    let phase = spec.id.phase();

    let urls = js_sys::Array::new();
    for url in &spec.urls {
        urls.push(&JsValue::from_str(url));
    }
    let types = js_sys::Array::new();
    for name in spec.types.host_names() {
        types.push(&JsValue::from_str(name));
    }
    let extra_info = js_sys::Array::new();
    for info in phase.extra_info() {
        extra_info.push(&JsValue::from_str(info));
    }

    let obj = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&obj, &"id".into(), &JsValue::from_str(spec.id.name()));
    let _ = js_sys::Reflect::set(&obj, &"event".into(), &JsValue::from_str(phase.event_name()));
    let _ = js_sys::Reflect::set(&obj, &"urls".into(), &urls);
    let _ = js_sys::Reflect::set(&obj, &"types".into(), &types);
    let _ = js_sys::Reflect::set(&obj, &"extraInfoSpec".into(), &extra_info);
    obj.into()
}

impl InterceptionHost for JsInterceptionHost {
    fn install(&mut self, spec: &HookSpec) -> Result<(), HostError> {
        self.call("install", &spec_to_js(spec)).map_err(|reason| HostError::Install {
            hook: spec.id.name(),
            reason,
        })
    }

    fn remove(&mut self, id: HookId) -> Result<(), HostError> {
        self.call("remove", &JsValue::from_str(id.name()))
            .map_err(|reason| HostError::Remove { hook: id.name(), reason })
    }
}
