//! `ConfigStore` over the extension's async key-value storage.
//!
//! The backend object exposes promise-returning `get(key)` and
//! `set(key, value)`; `get` resolves to `undefined` for a missing key.

use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use mk_core::error::StoreError;
use mk_core::ConfigStore;

use crate::convert::{describe, js_to_json, json_to_js};

pub struct BrowserStorage {
    backend: JsValue,
}

impl BrowserStorage {
    pub fn new(backend: JsValue) -> Self {
        Self { backend }
    }

    async fn call(&self, method: &str, args: &[JsValue]) -> Result<JsValue, String> {
        let function = js_sys::Reflect::get(&self.backend, &method.into())
            .map_err(|e| describe(&e))?
            .dyn_into::<js_sys::Function>()
            .map_err(|_| format!("storage.{} is not a function", method))?;
        let args: js_sys::Array = args.iter().collect();
        let returned = function.apply(&self.backend, &args).map_err(|e| describe(&e))?;
        JsFuture::from(js_sys::Promise::resolve(&returned))
            .await
            .map_err(|e| describe(&e))
    }
}

impl ConfigStore for BrowserStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw = self
            .call("get", &[JsValue::from_str(key)])
            .await
            .map_err(StoreError::Read)?;
        if raw.is_undefined() || raw.is_null() {
            return Ok(None);
        }
        js_to_json(&raw).map(Some).map_err(StoreError::Read)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let value = json_to_js(&value).map_err(StoreError::Write)?;
        self.call("set", &[JsValue::from_str(key), value])
            .await
            .map(|_| ())
            .map_err(StoreError::Write)
    }
}
