//! JS <-> Rust value conversion

use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};

use mk_core::Header;

/// Readable text for a thrown JS value.
pub fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

pub fn json_to_js(value: &Value) -> Result<JsValue, String> {
    let text = serde_json::to_string(value).map_err(|e| e.to_string())?;
    js_sys::JSON::parse(&text).map_err(|e| describe(&e))
}

/// `undefined` maps to `Value::Null`.
pub fn js_to_json(value: &JsValue) -> Result<Value, String> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let text = js_sys::JSON::stringify(value).map_err(|e| describe(&e))?;
    let text = text.as_string().unwrap_or_default();
    serde_json::from_str(&text).map_err(|e| e.to_string())
}

// =============================================================================
// Headers
// =============================================================================

/// The host's header objects, kept so mutation can write back in place.
/// Entries carrying `binaryValue` instead of `value` survive untouched
/// unless mediation rewrites them.
pub struct JsHeaders {
    entries: Vec<JsValue>,
    values: Vec<Option<String>>,
}

impl JsHeaders {
    pub fn read(headers: &JsValue) -> (Self, Vec<Header>) {
        let array = js_sys::Array::from(headers);
        let len = array.length() as usize;
        let mut entries = Vec::with_capacity(len);
        let mut values = Vec::with_capacity(len);
        let mut parsed = Vec::with_capacity(len);

        for entry in array.iter() {
            let name = js_sys::Reflect::get(&entry, &"name".into())
                .ok()
                .and_then(|value| value.as_string())
                .unwrap_or_default();
            let value = js_sys::Reflect::get(&entry, &"value".into())
                .ok()
                .and_then(|value| value.as_string());

            parsed.push(Header::new(name, value.clone().unwrap_or_default()));
            values.push(value);
            entries.push(entry);
        }

        (Self { entries, values }, parsed)
    }

    /// Mediation only rewrites values and appends, so position `i` of
    /// `headers` still corresponds to entry `i`.
    pub fn write(self, headers: Vec<Header>) -> js_sys::Array {
        let out = js_sys::Array::new_with_length(headers.len() as u32);
        let mut entries = self.entries.into_iter();
        let mut values = self.values.into_iter();

        for (i, header) in headers.into_iter().enumerate() {
            let entry = match (entries.next(), values.next()) {
                (Some(entry), Some(original)) => {
                    let unchanged = match original {
                        Some(ref v) => *v == header.value,
                        None => header.value.is_empty(),
                    };
                    if !unchanged {
                        let _ = js_sys::Reflect::set(&entry, &"value".into(), &JsValue::from_str(&header.value));
                    }
                    entry
                }
                _ => {
                    let obj = js_sys::Object::new();
                    let _ = js_sys::Reflect::set(&obj, &"name".into(), &JsValue::from_str(&header.name));
                    let _ = js_sys::Reflect::set(&obj, &"value".into(), &JsValue::from_str(&header.value));
                    obj.into()
                }
            };
            out.set(i as u32, entry);
        }

        out
    }
}
