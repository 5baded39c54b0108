//! Page-context overrides
//!
//! The engine never synthesizes page code. It builds a data payload (the
//! ordered override list plus an optional timezone offset) and hands it to
//! a fixed runtime that interprets it inside the page realm. `PageRealm`
//! is that interpreter's view of the realm; `ScriptSink` is how the payload
//! gets there.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EffectiveConfig;
use crate::engine::LOG_TARGET;
use crate::error::InjectError;
use crate::types::OverrideDescriptor;

/// Target meaning "assign on the realm global" instead of redefining.
pub const WINDOW_TARGET: &str = "window";

/// Value standing for JS `undefined`, which JSON cannot express.
pub const UNDEFINED_SENTINEL: &str = "undefined";

/// Data delivered into the page realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct InjectionPayload {
    /// Applied in order; a later entry for the same target/property wins
    pub overrides: Vec<OverrideDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_offset_minutes: Option<i32>,
    #[serde(default)]
    pub debug: bool,
}

/// Build the payload for `config`, or `None` when there is nothing to do
/// (mode OFF, or every page flag cleared).
pub fn build_payload(config: &EffectiveConfig) -> Option<InjectionPayload> {
    if !config.is_active() {
        return None;
    }

    let flags = &config.flags;
    let general = &config.general;

    let mut overrides = Vec::new();
    if flags.mock_navigator {
        overrides.extend(general.alt_navigator.iter().cloned());
    }
    if flags.mock_language {
        overrides.extend(general.alt_language.iter().cloned());
    }
    if flags.mock_screen_resolution {
        overrides.extend(general.alt_screen.iter().cloned());
    }

    let timezone_offset_minutes = flags.mock_timezone.then_some(general.alt_timezone_offset_minutes);

    if overrides.is_empty() && timezone_offset_minutes.is_none() {
        return None;
    }

    Some(InjectionPayload {
        overrides,
        timezone_offset_minutes,
        debug: flags.debug_mode,
    })
}

// =============================================================================
// Interpreter
// =============================================================================

/// An override value as the page realm should see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageValue<'a> {
    Undefined,
    Json(&'a Value),
}

impl<'a> PageValue<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::String(s) if s == UNDEFINED_SENTINEL => PageValue::Undefined,
            other => PageValue::Json(other),
        }
    }
}

/// Operations the interpreter needs from a page realm.
pub trait PageRealm {
    /// Plain assignment `global[property] = value`.
    fn assign_global(&mut self, property: &str, value: PageValue<'_>) -> Result<(), InjectError>;

    /// Redefine `property` on the object reached by `path` from the global.
    fn define(&mut self, path: &[&str], property: &str, value: PageValue<'_>) -> Result<(), InjectError>;

    /// Make the realm's timezone-offset query return `minutes`.
    fn set_timezone_offset(&mut self, minutes: i32) -> Result<(), InjectError>;
}

/// Outcome of applying a payload to one realm.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

/// Apply every override in order, then the timezone offset. A failing
/// entry is skipped; the rest still apply.
pub fn apply_overrides<R: PageRealm + ?Sized>(realm: &mut R, payload: &InjectionPayload) -> ApplyReport {
    let mut report = ApplyReport::default();

    for entry in &payload.overrides {
        let value = PageValue::of(&entry.value);
        let result = if entry.target == WINDOW_TARGET {
            realm.assign_global(&entry.property, value)
        } else {
            let path: Vec<&str> = entry.target.split('.').filter(|s| !s.is_empty()).collect();
            realm.define(&path, &entry.property, value)
        };

        match result {
            Ok(()) => report.applied += 1,
            Err(e) => {
                report.failed += 1;
                if payload.debug {
                    debug!(target: LOG_TARGET, "Override skipped: {}", e);
                }
            }
        }
    }

    if let Some(minutes) = payload.timezone_offset_minutes {
        match realm.set_timezone_offset(minutes) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                report.failed += 1;
                if payload.debug {
                    debug!(target: LOG_TARGET, "Timezone override skipped: {}", e);
                }
            }
        }
    }

    report
}

// =============================================================================
// Delivery
// =============================================================================

/// Puts the fixed runtime plus a payload into the page realm.
pub trait ScriptSink {
    /// Inline script element. Fails when the page's content policy blocks it.
    fn append_inline(&mut self, payload_json: &str) -> Result<(), InjectError>;

    /// Script element referencing a blob object URL.
    fn append_blob(&mut self, payload_json: &str) -> Result<(), InjectError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Inline,
    Blob,
    /// Page left unmodified
    Failed,
}

/// Deliver `payload`: inline first, blob reference if inline is rejected.
/// There is no retry beyond that and failures only show in debug logs.
pub fn deliver<S: ScriptSink + ?Sized>(sink: &mut S, payload: &InjectionPayload) -> Delivery {
    let json = match serde_json::to_string(payload) {
        Ok(json) => json,
        Err(e) => {
            if payload.debug {
                debug!(target: LOG_TARGET, "{}", InjectError::Encode(e));
            }
            return Delivery::Failed;
        }
    };

    match sink.append_inline(&json) {
        Ok(()) => return Delivery::Inline,
        Err(e) => {
            if payload.debug {
                debug!(target: LOG_TARGET, "{}; trying a blob reference", e);
            }
        }
    }

    match sink.append_blob(&json) {
        Ok(()) => Delivery::Blob,
        Err(e) => {
            if payload.debug {
                debug!(target: LOG_TARGET, "{}; page left unmodified", e);
            }
            Delivery::Failed
        }
    }
}

/// Build and deliver in one step. `None` when there was no payload.
pub fn inject_page<S: ScriptSink + ?Sized>(sink: &mut S, config: &EffectiveConfig) -> Option<Delivery> {
    let payload = build_payload(config)?;
    Some(deliver(sink, &payload))
}
