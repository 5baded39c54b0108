//! Privacy modes and their baseline flag bundles
//!
//! `resolve` turns a selected mode plus the mode-independent general
//! settings into a complete `EffectiveConfig`. It is pure.

use serde::{Deserialize, Serialize};

use crate::config::{EffectiveConfig, GeneralSettings};

/// Coarse privacy level selected in the settings UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Off,
    #[default]
    Normal,
    Aggressive,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Off, Mode::Normal, Mode::Aggressive];

    /// Lenient parse of a stored mode value. Anything unrecognized maps to
    /// `Aggressive` so a corrupted value never lowers protection.
    pub fn parse_lenient(value: &serde_json::Value) -> Self {
        value
            .as_str()
            .and_then(Self::from_name)
            .unwrap_or(Mode::Aggressive)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "off" => Some(Mode::Off),
            "normal" => Some(Mode::Normal),
            "aggressive" => Some(Mode::Aggressive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Normal => "normal",
            Mode::Aggressive => "aggressive",
        }
    }

    /// Fixed flag bundle for this mode.
    pub fn baseline(self) -> FlagSet {
        match self {
            Mode::Off => FlagSet::default(),
            Mode::Normal => FlagSet {
                mock_user_agent: true,
                mock_accept_header: true,
                enable_dnt: true,
                mock_navigator: true,
                block_tracking_urls: true,
                ..FlagSet::default()
            },
            Mode::Aggressive => FlagSet {
                mock_user_agent: true,
                mock_accept_header: true,
                enable_dnt: true,
                mock_navigator: true,
                block_tracking_urls: true,
                mock_timezone: true,
                mock_screen_resolution: true,
                mock_language: true,
                debug_mode: false,
            },
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown mode '{s}' (expected off, normal or aggressive)"))
    }
}

/// Feature toggles. Every mode's baseline sets all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct FlagSet {
    pub mock_user_agent: bool,
    pub mock_accept_header: bool,
    pub enable_dnt: bool,
    pub mock_navigator: bool,
    pub block_tracking_urls: bool,
    pub mock_timezone: bool,
    pub mock_screen_resolution: bool,
    pub mock_language: bool,
    pub debug_mode: bool,
}

impl FlagSet {
    /// Whether any request header is rewritten or added.
    pub fn touches_request_headers(&self) -> bool {
        self.mock_user_agent || self.mock_accept_header || self.enable_dnt
    }

    /// Whether the page payload would contain anything.
    pub fn touches_page(&self) -> bool {
        self.mock_navigator || self.mock_language || self.mock_screen_resolution || self.mock_timezone
    }
}

/// Merge the general settings over the baseline of `mode`.
///
/// Flags come from the baseline; data comes from `general`. The two key sets
/// are disjoint, so general settings win every collision by construction.
pub fn resolve(mode: Mode, general: &GeneralSettings) -> EffectiveConfig {
    EffectiveConfig {
        mode,
        flags: mode.baseline(),
        general: general.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_off_disables_everything() {
        let flags = Mode::Off.baseline();
        assert!(!flags.touches_request_headers());
        assert!(!flags.touches_page());
        assert!(!flags.block_tracking_urls);
    }

    #[test]
    fn test_normal_baseline() {
        let flags = Mode::Normal.baseline();
        assert!(flags.mock_user_agent && flags.mock_accept_header && flags.enable_dnt);
        assert!(flags.mock_navigator && flags.block_tracking_urls);
        assert!(!flags.mock_timezone && !flags.mock_screen_resolution && !flags.mock_language);
    }

    #[test]
    fn test_aggressive_enables_all_mocking() {
        let flags = Mode::Aggressive.baseline();
        assert!(flags.touches_request_headers());
        assert!(flags.mock_timezone && flags.mock_screen_resolution && flags.mock_language);
        assert!(flags.block_tracking_urls);
    }

    #[test]
    fn test_parse_lenient_fails_safe() {
        assert_eq!(Mode::parse_lenient(&json!("OFF")), Mode::Off);
        assert_eq!(Mode::parse_lenient(&json!("normal")), Mode::Normal);
        assert_eq!(Mode::parse_lenient(&json!("paranoid")), Mode::Aggressive);
        assert_eq!(Mode::parse_lenient(&json!(1)), Mode::Aggressive);
        assert_eq!(Mode::parse_lenient(&serde_json::Value::Null), Mode::Aggressive);
    }

    #[test]
    fn test_resolve_keeps_general_data() {
        let mut general = GeneralSettings::default();
        general.alt_user_agent = "Y".to_string();
        let config = resolve(Mode::Normal, &general);
        assert_eq!(config.mode, Mode::Normal);
        assert_eq!(config.flags, Mode::Normal.baseline());
        assert_eq!(config.general.alt_user_agent, "Y");
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Mode::Aggressive).unwrap(), json!("aggressive"));
    }
}
