//! Persistence collaborator and the load/heal/seed path
//!
//! The store is an async key-value interface; the whole persisted object
//! lives under one key. Nothing here is on the per-request path.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{info, warn};
use serde_json::Value;

use crate::config::{heal, EffectiveConfig, EngineOptions, Repair};
use crate::engine::LOG_TARGET;
use crate::error::StoreError;
use crate::mode::{resolve, Mode};

/// Async key-value persistence.
#[allow(async_fn_in_trait)]
pub trait ConfigStore {
    /// The stored object, or `None` on first run.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Store was empty; the default mode's baseline was written
    Seeded,
    /// Stored object was complete
    Stored,
    /// Stored object was repaired and written back
    Healed(Vec<Repair>),
    /// Store could not be read. Carries the aggressive baseline, which the
    /// engine only uses when nothing was loaded before
    Fallback,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub config: EffectiveConfig,
    pub source: LoadSource,
}

/// Load, heal and (when needed) rewrite the persisted configuration.
///
/// Never fails: a read error yields the aggressive baseline, a write error
/// is logged and the in-memory result stays authoritative.
pub async fn load_effective<S: ConfigStore>(store: &S, opts: &EngineOptions) -> LoadOutcome {
    let stored = match store.get(&opts.storage_key).await {
        Ok(stored) => stored,
        Err(e) => {
            warn!(target: LOG_TARGET, "Failed to load configuration, using aggressive baseline: {}", e);
            return LoadOutcome {
                config: resolve(Mode::Aggressive, &opts.general),
                source: LoadSource::Fallback,
            };
        }
    };

    match stored {
        None => {
            let config = resolve(opts.default_mode, &opts.general);
            info!(target: LOG_TARGET, "First run, seeding configuration with mode {}", config.mode);
            save_config(store, opts, &config).await;
            LoadOutcome {
                config,
                source: LoadSource::Seeded,
            }
        }
        Some(value) => {
            let healed = heal(&value, opts);
            if !healed.needs_write() {
                return LoadOutcome {
                    config: healed.config,
                    source: LoadSource::Stored,
                };
            }

            info!(
                target: LOG_TARGET,
                "Healed stored configuration ({} repairs), writing it back",
                healed.repairs.len()
            );
            save_config(store, opts, &healed.config).await;
            LoadOutcome {
                config: healed.config,
                source: LoadSource::Healed(healed.repairs),
            }
        }
    }
}

/// Persist `config`. Failures are logged and otherwise ignored.
pub async fn save_config<S: ConfigStore>(store: &S, opts: &EngineOptions, config: &EffectiveConfig) -> bool {
    match store.set(&opts.storage_key, config.to_json()).await {
        Ok(()) => true,
        Err(e) => {
            warn!(target: LOG_TARGET, "Failed to persist configuration: {}", e);
            false
        }
    }
}

// =============================================================================
// In-memory Store
// =============================================================================

/// In-memory store. Reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }

    /// Current raw value, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().ok().and_then(|entries| entries.get(key).cloned())
    }
}

impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read("read failure injected".to_string()));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write("write failure injected".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}
