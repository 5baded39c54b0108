//! Browser tests for the bindings. Run with `wasm-pack test --headless --chrome`.

use serde_json::json;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::Document;

use mk_core::inject::{apply_overrides, deliver, ApplyReport, Delivery, InjectionPayload, ScriptSink};
use mk_core::OverrideDescriptor;
use mk_wasm::convert::{js_to_json, json_to_js, JsHeaders};
use mk_wasm::page::{apply_to_subtree, DomScriptSink, WindowRealm, PAYLOAD_ATTR};
use mk_wasm::{apply_page_overrides, on_before_request, on_before_send_headers};

wasm_bindgen_test_configure!(run_in_browser);

fn header(name: &str, value: &str) -> JsValue {
    json_to_js(&json!({ "name": name, "value": value })).unwrap()
}

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn get(target: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(target, &key.into()).unwrap()
}

fn payload(overrides: Vec<OverrideDescriptor>) -> InjectionPayload {
    InjectionPayload {
        overrides,
        timezone_offset_minutes: None,
        debug: false,
    }
}

/// Appends an `about:blank` iframe and returns its window.
fn append_frame(document: &Document) -> JsValue {
    let frame = document.create_element("iframe").unwrap();
    document.body().unwrap().append_child(&frame).unwrap();
    get(&frame, "contentWindow")
}

async fn sleep(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
fn test_hooks_pass_through_before_init() {
    let headers = js_sys::Array::of2(&header("User-Agent", "X"), &header("Accept", "*/*"));
    let result = on_before_send_headers("https://example.com/", headers.into());
    let out = js_sys::Reflect::get(&result, &"requestHeaders".into()).unwrap();
    assert_eq!(
        js_to_json(&out).unwrap(),
        json!([{ "name": "User-Agent", "value": "X" }, { "name": "Accept", "value": "*/*" }])
    );

    let response = on_before_request("https://tracker.example/pixel.gif", "image");
    assert_eq!(js_to_json(&response).unwrap(), json!({}));
}

#[wasm_bindgen_test]
fn test_header_write_back_keeps_binary_entries() {
    let binary = json_to_js(&json!({ "name": "X-Bin", "binaryValue": [1, 2] })).unwrap();
    let headers = js_sys::Array::of2(&header("User-Agent", "X"), &binary);

    let (entries, mut parsed) = JsHeaders::read(&headers.into());
    parsed[0].value = "Y".to_string();
    parsed.push(mk_core::Header::new("DNT", "1"));

    let out = js_to_json(&entries.write(parsed).into()).unwrap();
    assert_eq!(
        out,
        json!([
            { "name": "User-Agent", "value": "Y" },
            { "name": "X-Bin", "binaryValue": [1, 2] },
            { "name": "DNT", "value": "1" }
        ])
    );
}

#[wasm_bindgen_test]
fn test_window_realm_applies_descriptors() {
    let global = json_to_js(&json!({ "navigator": { "platform": "Linux" }, "screen": {} })).unwrap();
    let payload = InjectionPayload {
        overrides: vec![
            OverrideDescriptor::new("navigator", "platform", "Win32"),
            OverrideDescriptor::new("screen", "width", 1920),
            OverrideDescriptor::new("window", "devicePixelRatio", 2),
            OverrideDescriptor::new("navigator.connection", "rtt", 50),
        ],
        timezone_offset_minutes: None,
        debug: false,
    };

    let report = apply_overrides(&mut WindowRealm::new(global.clone()), &payload);
    assert_eq!(report, ApplyReport { applied: 3, failed: 1 });
    let get = |target: &JsValue, key: &str| js_sys::Reflect::get(target, &key.into()).unwrap();
    let navigator = get(&global, "navigator");
    let screen = get(&global, "screen");
    assert_eq!(get(&navigator, "platform").as_string().as_deref(), Some("Win32"));
    // Newly defined properties are not enumerable, so read them directly.
    assert_eq!(get(&screen, "width").as_f64(), Some(1920.0));
    assert_eq!(get(&global, "devicePixelRatio").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
fn test_inline_delivery_runs_runtime() {
    let document = web_sys::window().unwrap().document().unwrap();
    let payload = InjectionPayload {
        overrides: vec![OverrideDescriptor::new("window", "__mockifyInline", "applied")],
        timezone_offset_minutes: None,
        debug: false,
    };

    assert_eq!(deliver(&mut DomScriptSink::new(document), &payload), Delivery::Inline);

    let window: JsValue = web_sys::window().unwrap().into();
    let marker = js_sys::Reflect::get(&window, &"__mockifyInline".into()).unwrap();
    assert_eq!(marker.as_string().as_deref(), Some("applied"));
}

#[wasm_bindgen_test]
async fn test_watched_frames_get_overrides() {
    let payload = payload(vec![OverrideDescriptor::new("navigator", "platform", "MockifyOS")]);
    let report = apply_page_overrides(json_to_js(&serde_json::to_value(&payload).unwrap()).unwrap()).unwrap();
    assert_eq!(get(&report, "failed").as_f64(), Some(0.0));

    let frame = append_frame(&document());
    sleep(0).await;

    let navigator = get(&frame, "navigator");
    assert_eq!(get(&navigator, "platform").as_string().as_deref(), Some("MockifyOS"));
}

#[wasm_bindgen_test]
async fn test_runtime_reapplies_to_added_frames() {
    let payload = payload(vec![OverrideDescriptor::new("navigator", "vendor", "Mockify Vendor")]);
    assert_eq!(deliver(&mut DomScriptSink::new(document()), &payload), Delivery::Inline);

    let frame = append_frame(&document());
    sleep(0).await;

    let navigator = get(&frame, "navigator");
    assert_eq!(get(&navigator, "vendor").as_string().as_deref(), Some("Mockify Vendor"));
}

#[wasm_bindgen_test]
fn test_subtree_covers_any_nested_browsing_context() {
    let payload = payload(vec![OverrideDescriptor::new("navigator", "platform", "Win32")]);

    // An <object>/<embed>/<frame> is reached through contentWindow, whatever its tag.
    let object = json_to_js(&json!({
        "tagName": "OBJECT",
        "contentWindow": { "navigator": { "platform": "Linux" } }
    }))
    .unwrap();
    apply_to_subtree(object.clone(), &payload);
    let navigator = get(&get(&object, "contentWindow"), "navigator");
    assert_eq!(get(&navigator, "platform").as_string().as_deref(), Some("Win32"));

    // No navigator, nothing to override.
    let bare = json_to_js(&json!({ "contentWindow": {} })).unwrap();
    apply_to_subtree(bare.clone(), &payload);
    assert!(get(&get(&bare, "contentWindow"), "navigator").is_undefined());
}

#[wasm_bindgen_test]
fn test_timezone_override_changes_date() {
    let frame = append_frame(&document());
    let payload = InjectionPayload {
        overrides: Vec::new(),
        timezone_offset_minutes: Some(-330),
        debug: false,
    };
    let report = apply_overrides(&mut WindowRealm::new(frame.clone()), &payload);
    assert_eq!(report, ApplyReport { applied: 1, failed: 0 });

    let date_ctor: js_sys::Function = get(&frame, "Date").unchecked_into();
    let date = js_sys::Reflect::construct(&date_ctor, &js_sys::Array::new()).unwrap();
    let offset: js_sys::Function = get(&date, "getTimezoneOffset").unchecked_into();
    assert_eq!(offset.call0(&date).unwrap().as_f64(), Some(-330.0));
}

#[wasm_bindgen_test]
async fn test_blob_delivery_runs_runtime() {
    let payload = payload(vec![OverrideDescriptor::new("window", "__mockifyBlob", "applied")]);
    let json = serde_json::to_string(&payload).unwrap();
    DomScriptSink::new(document()).append_blob(&json).unwrap();

    let window: JsValue = web_sys::window().unwrap().into();
    let mut value = JsValue::UNDEFINED;
    for _ in 0..50 {
        sleep(20).await;
        value = get(&window, "__mockifyBlob");
        if !value.is_undefined() {
            break;
        }
    }
    assert_eq!(value.as_string().as_deref(), Some("applied"));

    // The element removes itself once loaded.
    sleep(20).await;
    let selector = format!("script[{}]", PAYLOAD_ATTR);
    assert!(document().query_selector(&selector).unwrap().is_none());
}
