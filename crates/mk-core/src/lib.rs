//! Mockify Core Library
//!
//! The privacy-mediation engine: resolves a stored privacy mode into an
//! effective configuration, keeps the host's interception hooks in step
//! with it, and implements the mutations those hooks perform.
//!
//! # Architecture
//!
//! Every collaborator outside the engine (the key-value store, the
//! network-interception host, the page script sink) is a trait. The engine
//! holds one immutable configuration snapshot that is swapped whole on
//! reconfiguration; per-request hooks read it without waiting.
//!
//! # Modules
//!
//! - `mode`: privacy modes, baseline flag bundles and `resolve`
//! - `config`: effective configuration, general settings, schema healing
//! - `store`: persistence trait and the load/heal/seed path
//! - `registry`: desired-hook computation and install/remove reconciliation
//! - `headers`: request and response header mediation
//! - `filter`: URL classification against the blocklist
//! - `pattern`: match patterns, websocket expansion, blocklist files
//! - `inject`: page override payload, interpreter and delivery
//! - `channel`: cross-context messages
//! - `engine`: the engine and its shared snapshot
//! - `url`: allocation-free URL slicing
//! - `types`: shared type definitions

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod headers;
pub mod inject;
pub mod mode;
pub mod pattern;
pub mod registry;
pub mod store;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use channel::{Message, Reply};
pub use config::{EffectiveConfig, EngineOptions, GeneralSettings};
pub use engine::{EngineState, MediationEngine, SharedConfig, LOG_TARGET};
pub use mode::{resolve, FlagSet, Mode};
pub use registry::{HookId, HookSpec, InterceptionHost};
pub use store::ConfigStore;
pub use types::{FilterAction, Header, OverrideDescriptor, ResourceType};
