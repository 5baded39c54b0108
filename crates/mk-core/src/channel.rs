//! Cross-context messages
//!
//! The settings UI sends `{action: "reload"}` after writing the store; the
//! content script sends `{action: "getConfig"}` once per page load and gets
//! the full effective configuration back.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{heal, EffectiveConfig, EngineOptions};
use crate::engine::LOG_TARGET;
use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Re-read the store and reconcile hooks
    Reload,
    /// Reply with the current effective configuration
    GetConfig,
}

impl Message {
    pub fn parse(value: &Value) -> Result<Self, ChannelError> {
        Ok(Self::deserialize(value)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No payload
    Ack,
    Config(Box<EffectiveConfig>),
}

impl Reply {
    pub fn to_json(&self) -> Value {
        match self {
            Reply::Ack => Value::Null,
            Reply::Config(config) => config.to_json(),
        }
    }
}

/// Requester side of `getConfig`: any failure or unusable reply means
/// "run on the fallback baseline".
pub fn config_or_fallback(reply: Result<Value, ChannelError>) -> EffectiveConfig {
    let value = match reply {
        Ok(Value::Null) => Err(ChannelError::NoReply),
        other => other,
    };

    match value {
        Ok(value) => heal(&value, &EngineOptions::default()).config,
        Err(e) => {
            warn!(target: LOG_TARGET, "getConfig failed, using fallback configuration: {}", e);
            EffectiveConfig::fallback()
        }
    }
}
