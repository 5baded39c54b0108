//! WebAssembly bindings for Mockify
//!
//! Background side: `init` wires the engine to a storage backend and an
//! interception bridge; the `on_*` exports are the hook bodies the bridge
//! forwards to. Content side: `inject_page_overrides` fetches the
//! configuration and delivers the page runtime.

pub mod console;
pub mod convert;
pub mod host;
pub mod page;
pub mod storage;

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;

use log::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use mk_core::channel::config_or_fallback;
use mk_core::error::ChannelError;
use mk_core::inject::{apply_overrides, inject_page, Delivery, InjectionPayload};
use mk_core::store::load_effective;
use mk_core::types::BlockingResponse;
use mk_core::{EffectiveConfig, EngineOptions, MediationEngine, Message, ResourceType, SharedConfig, LOG_TARGET};

use crate::convert::{describe, js_to_json, json_to_js, JsHeaders};
use crate::host::JsInterceptionHost;
use crate::page::{watch_frames, DomScriptSink, WindowRealm};
use crate::storage::BrowserStorage;

struct EngineHandle {
    engine: RefCell<MediationEngine<JsInterceptionHost>>,
    store: BrowserStorage,
    shared: SharedConfig,
    reloads: ReloadGate,
}

/// Orders overlapping reloads: each one takes a ticket before its store read
/// and applies only if no newer ticket was issued meanwhile.
#[derive(Debug, Default)]
struct ReloadGate {
    latest: Cell<u64>,
}

impl ReloadGate {
    fn begin(&self) -> u64 {
        let ticket = self.latest.get() + 1;
        self.latest.set(ticket);
        ticket
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.latest.get() == ticket
    }
}

thread_local! {
    static ENGINE: OnceCell<Rc<EngineHandle>> = const { OnceCell::new() };
}

fn engine_handle() -> Option<Rc<EngineHandle>> {
    ENGINE.with(|cell| cell.get().cloned())
}

fn shared() -> Option<SharedConfig> {
    engine_handle().map(|handle| handle.shared.clone())
}

/// Load from the store without holding the engine across the await, then
/// apply synchronously. A load overtaken by a newer reload is discarded.
async fn reload(handle: &EngineHandle) {
    let ticket = handle.reloads.begin();

    let options = handle.engine.borrow().options().clone();
    let outcome = load_effective(&handle.store, &options).await;
    if !handle.reloads.is_current(ticket) {
        info!(target: LOG_TARGET, "Discarding configuration load {} superseded by a newer reload", ticket);
        return;
    }

    let source = outcome.source.clone();
    let Some(report) = handle.engine.borrow_mut().apply_loaded(outcome) else {
        return;
    };
    console::set_debug(handle.shared.load().config.flags.debug_mode);
    info!(
        target: LOG_TARGET,
        "Configuration loaded ({:?}): {} hooks installed, {} removed",
        source,
        report.installed.len(),
        report.removed.len()
    );
}

// =============================================================================
// Background
// =============================================================================

#[wasm_bindgen]
pub async fn init(storage: JsValue, bridge: JsValue) -> Result<(), JsValue> {
    console::init();

    if engine_handle().is_some() {
        return Err(JsValue::from_str("Already initialized. Send a reload message instead."));
    }

    let engine = MediationEngine::new(JsInterceptionHost::new(bridge), EngineOptions::default());
    let handle = Rc::new(EngineHandle {
        shared: engine.shared(),
        engine: RefCell::new(engine),
        store: BrowserStorage::new(storage),
        reloads: ReloadGate::default(),
    });

    ENGINE
        .with(|cell| cell.set(Rc::clone(&handle)))
        .map_err(|_| JsValue::from_str("Failed to set engine state"))?;

    reload(&handle).await;
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    engine_handle().is_some()
}

/// Runtime message handler. Resolves to `undefined` for `reload` and to the
/// configuration object for `getConfig`.
#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let handle = engine_handle().ok_or_else(|| JsValue::from_str("Not initialized"))?;

    let value = js_to_json(&message).map_err(|e| JsValue::from_str(&e))?;
    let message = Message::parse(&value).map_err(|e| JsValue::from_str(&e.to_string()))?;

    match message {
        Message::Reload => {
            reload(&handle).await;
            Ok(JsValue::UNDEFINED)
        }
        Message::GetConfig => get_config(),
    }
}

#[wasm_bindgen]
pub fn get_config() -> Result<JsValue, JsValue> {
    let config = shared()
        .map(|shared| shared.load().config.clone())
        .unwrap_or_else(EffectiveConfig::fallback);
    json_to_js(&config.to_json()).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn on_before_send_headers(url: &str, headers: JsValue) -> JsValue {
    let (entries, parsed) = JsHeaders::read(&headers);
    let mutated = match shared() {
        Some(shared) => shared.on_before_send_headers(url, parsed),
        None => parsed,
    };

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"requestHeaders".into(), &entries.write(mutated));
    result.into()
}

#[wasm_bindgen]
pub fn on_headers_received(url: &str, headers: JsValue) -> JsValue {
    let (entries, parsed) = JsHeaders::read(&headers);
    let mutated = match shared() {
        Some(shared) => shared.on_headers_received(url, parsed),
        None => parsed,
    };

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"responseHeaders".into(), &entries.write(mutated));
    result.into()
}

#[wasm_bindgen]
pub fn on_before_request(url: &str, request_type: &str) -> JsValue {
    let response = match shared() {
        Some(shared) => BlockingResponse::from(shared.on_before_request(url, ResourceType::from_host_name(request_type))),
        None => BlockingResponse::default(),
    };

    let result = js_sys::Object::new();
    if let Some(redirect_url) = response.redirect_url {
        let _ = js_sys::Reflect::set(&result, &"redirectUrl".into(), &JsValue::from_str(&redirect_url));
    }
    if response.cancel {
        let _ = js_sys::Reflect::set(&result, &"cancel".into(), &JsValue::TRUE);
    }
    result.into()
}

// =============================================================================
// Content side
// =============================================================================

/// Ask the engine for its configuration through `send_message` and deliver
/// the page runtime. Any messaging failure runs the page on the fallback
/// configuration. Resolves to `"inline"`, `"blob"`, `"failed"` or `"none"`.
#[wasm_bindgen]
pub async fn inject_page_overrides(send_message: js_sys::Function) -> String {
    console::init();

    let request = json_to_js(&serde_json::json!({ "action": "getConfig" }));
    let reply = match request {
        Ok(request) => request_config(&send_message, &request).await,
        Err(e) => Err(ChannelError::Runtime(e)),
    };
    let config = config_or_fallback(reply);
    console::set_debug(config.flags.debug_mode);

    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        warn!(target: LOG_TARGET, "No document to inject into");
        return "failed".to_string();
    };

    let delivery = inject_page(&mut DomScriptSink::new(document), &config);
    match delivery {
        None => "none",
        Some(Delivery::Inline) => "inline",
        Some(Delivery::Blob) => "blob",
        Some(Delivery::Failed) => "failed",
    }
    .to_string()
}

async fn request_config(send_message: &js_sys::Function, request: &JsValue) -> Result<serde_json::Value, ChannelError> {
    let returned = send_message
        .call1(&JsValue::NULL, request)
        .map_err(|e| ChannelError::Runtime(describe(&e)))?;
    let reply = JsFuture::from(js_sys::Promise::resolve(&returned))
        .await
        .map_err(|e| ChannelError::Runtime(describe(&e)))?;
    js_to_json(&reply).map_err(ChannelError::Runtime)
}

/// Interpret `payload` directly in the current realm and keep doing so for
/// frames added later. For hosts that run this module in the page world.
#[wasm_bindgen]
pub fn apply_page_overrides(payload: JsValue) -> Result<JsValue, JsValue> {
    let value = js_to_json(&payload).map_err(|e| JsValue::from_str(&e))?;
    let payload: InjectionPayload =
        serde_json::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid payload: {}", e)))?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window.document();
    let report = apply_overrides(&mut WindowRealm::new(window.into()), &payload);

    if let Some(document) = document {
        watch_frames(&document, Rc::new(payload))?;
    }

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"applied".into(), &JsValue::from(report.applied as u32));
    let _ = js_sys::Reflect::set(&result, &"failed".into(), &JsValue::from(report.failed as u32));
    Ok(result.into())
}
