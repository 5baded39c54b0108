//! Core type definitions for the mediation engine
//!
//! These types are shared by the header mediator, the URL filter, the
//! interceptor registry and the page payload builder.

use serde::{Deserialize, Serialize};

// =============================================================================
// Resource Types (bit mask for hook filters)
// =============================================================================

bitflags::bitflags! {
    /// Resource type bit mask, one bit per host request type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUB_FRAME = 1 << 5;   // iframe/frame
        const MAIN_FRAME = 1 << 6;  // main document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const IMAGESET = 1 << 14;

        /// All request types
        const ALL = 0x7FFF;
        /// Types answered with the transparent pixel
        const IMAGES = Self::IMAGE.bits() | Self::IMAGESET.bits();
        /// Everything that is neither an image nor a nested frame
        const BLOCKED_OUTRIGHT = Self::ALL.bits()
            & !Self::IMAGES.bits()
            & !Self::SUB_FRAME.bits();
    }
}

const TYPE_NAMES: &[(ResourceType, &str)] = &[
    (ResourceType::MAIN_FRAME, "main_frame"),
    (ResourceType::SUB_FRAME, "sub_frame"),
    (ResourceType::STYLESHEET, "stylesheet"),
    (ResourceType::SCRIPT, "script"),
    (ResourceType::IMAGE, "image"),
    (ResourceType::IMAGESET, "imageset"),
    (ResourceType::FONT, "font"),
    (ResourceType::OBJECT, "object"),
    (ResourceType::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceType::PING, "ping"),
    (ResourceType::CSP_REPORT, "csp_report"),
    (ResourceType::MEDIA, "media"),
    (ResourceType::WEBSOCKET, "websocket"),
    (ResourceType::BEACON, "beacon"),
    (ResourceType::OTHER, "other"),
];

impl ResourceType {
    /// Parse from browser request type string.
    pub fn from_host_name(s: &str) -> Self {
        TYPE_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(ty, _)| *ty)
            .unwrap_or(Self::OTHER)
    }

    /// Host type names for every bit in the mask, in a stable order.
    pub fn host_names(self) -> Vec<&'static str> {
        TYPE_NAMES
            .iter()
            .filter(|(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
            .collect()
    }
}

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const DATA = 1 << 4;
        const FTP = 1 << 5;
        const FILE = 1 << 6;
        /// Schemes covered by a `*` scheme in a match pattern
        const WILDCARD = Self::HTTP.bits() | Self::HTTPS.bits();
        /// Schemes covered by `<all_urls>`
        const ALL = 0x7F;
    }
}

// =============================================================================
// Headers
// =============================================================================

/// One HTTP header as the interception host hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

// =============================================================================
// Page Overrides
// =============================================================================

/// A single property override applied inside the page realm.
///
/// `target` is `"window"` for a plain assignment on the realm global, or a
/// dot path (`"navigator"`, `"screen"`, `"navigator.connection"`) resolved
/// from the global whose `property` is redefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct OverrideDescriptor {
    pub target: String,
    pub property: String,
    #[cfg_attr(feature = "ts", ts(type = "unknown"))]
    pub value: serde_json::Value,
}

impl OverrideDescriptor {
    pub fn new(
        target: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            target: target.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Filter Actions
// =============================================================================

/// Decision for a request seen by a URL-block hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Request passes unchanged
    Allow,
    /// Request is answered with a substitute resource
    Redirect(&'static str),
    /// Request is cancelled
    Cancel,
}

/// The object a blocking hook returns to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub cancel: bool,
}

impl From<FilterAction> for BlockingResponse {
    fn from(action: FilterAction) -> Self {
        match action {
            FilterAction::Allow => Self::default(),
            FilterAction::Redirect(url) => Self {
                redirect_url: Some(url.to_string()),
                cancel: false,
            },
            FilterAction::Cancel => Self {
                redirect_url: None,
                cancel: true,
            },
        }
    }
}
