//! Effective configuration and schema healing
//!
//! The persisted object is whatever the settings UI last wrote. It may be
//! missing keys after an upgrade, carry keys from an older generation, or
//! hold values of the wrong type. `heal` turns any of that into a complete
//! `EffectiveConfig` and reports what it had to repair so the caller can
//! write the healed object back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mode::{resolve, FlagSet, Mode};
use crate::types::OverrideDescriptor;

/// Storage key holding the whole persisted object.
pub const CONFIG_KEY: &str = "config";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.169 Safari/537.36";

/// Request headers whose alternate values live in `alt_accept_headers`,
/// in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptHeader {
    Accept = 0,
    AcceptEncoding = 1,
    AcceptLanguage = 2,
}

impl AcceptHeader {
    pub fn header_name(self) -> &'static str {
        match self {
            AcceptHeader::Accept => "Accept",
            AcceptHeader::AcceptEncoding => "Accept-Encoding",
            AcceptHeader::AcceptLanguage => "Accept-Language",
        }
    }
}

/// Mode-independent data: alternate values and the blocklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GeneralSettings {
    pub alt_user_agent: String,
    /// Indexed by `AcceptHeader`
    pub alt_accept_headers: Vec<String>,
    pub alt_navigator: Vec<OverrideDescriptor>,
    pub alt_timezone_offset_minutes: i32,
    pub alt_screen: Vec<OverrideDescriptor>,
    pub alt_language: Vec<OverrideDescriptor>,
    pub block_url_patterns: Vec<String>,
}

impl GeneralSettings {
    pub fn alt_accept(&self, kind: AcceptHeader) -> Option<&str> {
        self.alt_accept_headers.get(kind as usize).map(String::as_str)
    }
}

impl Default for GeneralSettings {
    fn default() -> Self {
        let app_version = DEFAULT_USER_AGENT.trim_start_matches("Mozilla/");
        Self {
            alt_user_agent: DEFAULT_USER_AGENT.to_string(),
            alt_accept_headers: vec![
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                "gzip, deflate, br".to_string(),
                "en-US,en;q=0.9".to_string(),
            ],
            alt_navigator: vec![
                OverrideDescriptor::new("navigator", "userAgent", DEFAULT_USER_AGENT),
                OverrideDescriptor::new("navigator", "appVersion", app_version),
                OverrideDescriptor::new("navigator", "platform", "Win32"),
                OverrideDescriptor::new("navigator", "vendor", "Google Inc."),
                OverrideDescriptor::new("navigator", "oscpu", "undefined"),
                OverrideDescriptor::new("navigator", "hardwareConcurrency", 4),
                OverrideDescriptor::new("navigator", "maxTouchPoints", 0),
            ],
            alt_timezone_offset_minutes: 0,
            alt_screen: vec![
                OverrideDescriptor::new("screen", "width", 1920),
                OverrideDescriptor::new("screen", "height", 1080),
                OverrideDescriptor::new("screen", "availWidth", 1920),
                OverrideDescriptor::new("screen", "availHeight", 1040),
                OverrideDescriptor::new("screen", "colorDepth", 24),
                OverrideDescriptor::new("screen", "pixelDepth", 24),
                OverrideDescriptor::new("window", "devicePixelRatio", 1),
            ],
            alt_language: vec![
                OverrideDescriptor::new("navigator", "language", "en-US"),
                OverrideDescriptor::new("navigator", "languages", serde_json::json!(["en-US", "en"])),
            ],
            block_url_patterns: vec![
                "*://*.google-analytics.com/*".to_string(),
                "*://*.googletagmanager.com/*".to_string(),
                "*://*.doubleclick.net/*".to_string(),
                "*://*.scorecardresearch.com/*".to_string(),
                "*://connect.facebook.net/*".to_string(),
                "*://*.hotjar.com/*".to_string(),
            ],
        }
    }
}

/// The fully resolved, schema-complete configuration every hook consults.
///
/// Persisted as one flat object: `mode`, the flags and the general settings
/// side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct EffectiveConfig {
    pub mode: Mode,
    #[serde(flatten)]
    pub flags: FlagSet,
    #[serde(flatten)]
    pub general: GeneralSettings,
}

impl EffectiveConfig {
    /// Mode is not OFF.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.mode != Mode::Off
    }

    /// Configuration used whenever nothing better is known.
    pub fn fallback() -> Self {
        resolve(Mode::Aggressive, &GeneralSettings::default())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Mode seeded on first run
    pub default_mode: Mode,
    /// General settings used for seeding and backfill
    pub general: GeneralSettings,
    /// Storage key of the persisted object
    pub storage_key: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_mode: Mode::Normal,
            general: GeneralSettings::default(),
            storage_key: CONFIG_KEY.to_string(),
        }
    }
}

// =============================================================================
// Schema Healing
// =============================================================================

/// One change `heal` made to the persisted object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The stored value was not a JSON object at all
    NotAnObject,
    /// First-generation `power`/`alt_header` keys were converted
    LegacyMigrated,
    /// `mode` was missing or unrecognized and was reset to aggressive
    ModeReset,
    /// A missing key was backfilled from the baseline
    Added(String),
    /// A key with a value of the wrong type was replaced with the baseline
    Replaced(String),
    /// A key that is not part of the schema was removed
    Dropped(String),
    /// The repaired object still did not decode and was rebuilt from the
    /// mode's baseline
    Rebuilt,
}

/// Result of healing a persisted object.
#[derive(Debug, Clone)]
pub struct Healed {
    pub config: EffectiveConfig,
    pub repairs: Vec<Repair>,
}

impl Healed {
    /// The persisted object differs from `config` and should be rewritten.
    pub fn needs_write(&self) -> bool {
        !self.repairs.is_empty()
    }
}

/// Key set of a complete persisted object.
pub fn schema_keys() -> Vec<String> {
    match resolve(Mode::Normal, &GeneralSettings::default()).to_json() {
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Backfill, normalize and prune a persisted object.
pub fn heal(stored: &Value, opts: &EngineOptions) -> Healed {
    let mut repairs = Vec::new();

    let mut map = match stored {
        Value::Object(map) => map.clone(),
        _ => {
            repairs.push(Repair::NotAnObject);
            return Healed {
                config: resolve(Mode::Aggressive, &opts.general),
                repairs,
            };
        }
    };

    if migrate_legacy(&mut map) {
        repairs.push(Repair::LegacyMigrated);
    }

    let mode = match map.get("mode") {
        Some(raw) => {
            let mode = Mode::parse_lenient(raw);
            if raw.as_str() != Some(mode.as_str()) {
                if raw.as_str().and_then(Mode::from_name).is_none() {
                    repairs.push(Repair::ModeReset);
                } else {
                    repairs.push(Repair::Replaced("mode".to_string()));
                }
            }
            mode
        }
        None => {
            repairs.push(Repair::ModeReset);
            Mode::Aggressive
        }
    };
    map.insert("mode".to_string(), Value::String(mode.as_str().to_string()));

    let baseline = match resolve(mode, &opts.general).to_json() {
        Value::Object(baseline) => baseline,
        _ => Map::new(),
    };

    for (key, base_value) in &baseline {
        match map.get(key) {
            None => {
                map.insert(key.clone(), base_value.clone());
                repairs.push(Repair::Added(key.clone()));
            }
            Some(value) if !value_fits(&baseline, key, value) => {
                map.insert(key.clone(), base_value.clone());
                repairs.push(Repair::Replaced(key.clone()));
            }
            Some(_) => {}
        }
    }

    let extra: Vec<String> = map
        .keys()
        .filter(|key| !baseline.contains_key(*key))
        .cloned()
        .collect();
    for key in extra {
        map.remove(&key);
        repairs.push(Repair::Dropped(key));
    }

    let config = decode_or_rebuild(map, mode, opts, &mut repairs);
    Healed { config, repairs }
}

fn decode_or_rebuild(map: Map<String, Value>, mode: Mode, opts: &EngineOptions, repairs: &mut Vec<Repair>) -> EffectiveConfig {
    match serde_json::from_value(Value::Object(map)) {
        Ok(config) => config,
        Err(_) => {
            repairs.push(Repair::Rebuilt);
            resolve(mode, &opts.general)
        }
    }
}

/// Convert a first-generation object in place. Returns whether it did.
fn migrate_legacy(map: &mut Map<String, Value>) -> bool {
    if map.contains_key("mode") {
        return false;
    }
    let power = match map.get("power") {
        Some(power) => power.as_bool().unwrap_or(true),
        None => return false,
    };

    let mode = if power { Mode::Normal } else { Mode::Off };
    map.insert("mode".to_string(), Value::String(mode.as_str().to_string()));

    if !map.contains_key("alt_user_agent") {
        if let Some(Value::String(ua)) = map.get("alt_header") {
            let ua = ua.clone();
            map.insert("alt_user_agent".to_string(), Value::String(ua));
        }
    }
    true
}

/// Whether `value` deserializes in place of `baseline[key]`.
fn value_fits(baseline: &Map<String, Value>, key: &str, value: &Value) -> bool {
    let mut candidate = baseline.clone();
    candidate.insert(key.to_string(), value.clone());
    serde_json::from_value::<EffectiveConfig>(Value::Object(candidate)).is_ok()
}
