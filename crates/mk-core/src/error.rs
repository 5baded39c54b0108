//! Error types
//!
//! None of these ever reach the page or the user. Engine entry points log
//! them and fall back to the best-known configuration.

/// Failure of the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage read failed: {0}")]
    Read(String),
    #[error("Storage write failed: {0}")]
    Write(String),
    #[error("Stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A blocklist entry the host's match-pattern grammar would reject.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Missing '://' in pattern '{0}'")]
    MissingScheme(String),
    #[error("Unsupported scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("Missing path in pattern '{0}'")]
    MissingPath(String),
    #[error("Invalid host '{0}'")]
    InvalidHost(String),
}

/// Failure reported by the network-interception collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Failed to install hook {hook}: {reason}")]
    Install { hook: &'static str, reason: String },
    #[error("Failed to remove hook {hook}: {reason}")]
    Remove { hook: &'static str, reason: String },
}

/// Failure of the cross-context messaging collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("No reply from the engine")]
    NoReply,
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure to run the override payload inside the page realm.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("Inline script rejected: {0}")]
    InlineBlocked(String),
    #[error("Blob script rejected: {0}")]
    BlobBlocked(String),
    #[error("Override target '{0}' not found")]
    MissingTarget(String),
    #[error("Failed to define {target}.{property}: {reason}")]
    Define {
        target: String,
        property: String,
        reason: String,
    },
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}
