//! URL classification
//!
//! A request that matches the blocklist is never simply dropped when a
//! harmless substitute keeps the page intact: images get a transparent
//! pixel, nested frames get a blank document, everything else is cancelled.

use log::warn;

use crate::config::EffectiveConfig;
use crate::engine::LOG_TARGET;
use crate::error::PatternError;
use crate::pattern::{compile_patterns, websocket_patterns, MatchPattern};
use crate::types::{FilterAction, ResourceType};

/// 1x1 transparent GIF.
pub const TRANSPARENT_PIXEL: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

pub const BLANK_DOCUMENT: &str = "about:blank";

/// Action for a matched request of the given type.
#[inline]
pub fn action_for(resource_type: ResourceType) -> FilterAction {
    if resource_type.intersects(ResourceType::IMAGES) {
        FilterAction::Redirect(TRANSPARENT_PIXEL)
    } else if resource_type.contains(ResourceType::SUB_FRAME) {
        FilterAction::Redirect(BLANK_DOCUMENT)
    } else {
        FilterAction::Cancel
    }
}

/// Compiled form of `block_url_patterns`.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    enabled: bool,
    patterns: Vec<MatchPattern>,
    /// `ws://`/`wss://` expansions, matched against websocket requests only
    websocket: Vec<MatchPattern>,
    rejected: Vec<PatternError>,
}

impl Blocklist {
    /// Compile the configured patterns. Invalid ones are logged and skipped.
    pub fn compile(config: &EffectiveConfig) -> Self {
        let configured = &config.general.block_url_patterns;
        let (patterns, rejected) = compile_patterns(configured);
        let (websocket, _) = compile_patterns(&websocket_patterns(configured));

        for e in &rejected {
            warn!(target: LOG_TARGET, "Skipping blocklist entry: {}", e);
        }

        Self {
            enabled: config.is_active() && config.flags.block_tracking_urls,
            patterns,
            websocket,
            rejected,
        }
    }

    /// Whether blocking is on at all for this configuration.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn patterns(&self) -> &[MatchPattern] {
        &self.patterns
    }

    pub fn websocket_patterns(&self) -> &[MatchPattern] {
        &self.websocket
    }

    pub fn rejected(&self) -> &[PatternError] {
        &self.rejected
    }

    /// Does `url` match, taking the websocket expansion into account.
    pub fn matches(&self, url: &str, resource_type: ResourceType) -> bool {
        if self.patterns.iter().any(|p| p.matches(url)) {
            return true;
        }
        resource_type.contains(ResourceType::WEBSOCKET) && self.websocket.iter().any(|p| p.matches(url))
    }

    /// Decide what happens to a request.
    pub fn classify(&self, url: &str, resource_type: ResourceType) -> FilterAction {
        if !self.enabled || !self.matches(url, resource_type) {
            return FilterAction::Allow;
        }
        action_for(resource_type)
    }
}
