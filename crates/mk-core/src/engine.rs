//! Mediation engine
//!
//! Owns the interceptor registry and the shared configuration snapshot.
//! The snapshot is immutable: reconfiguration builds a new `EngineState`
//! and swaps the `Arc`, so a hook that already loaded the old one finishes
//! with it and never sees a half-updated value.
//!
//! Loading is async and only borrows the store; applying is sync and needs
//! `&mut self`, which serializes every registry change.

use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::channel::{Message, Reply};
use crate::config::{EffectiveConfig, EngineOptions};
use crate::filter::Blocklist;
use crate::headers::{mutate_request_headers, mutate_response_headers};
use crate::registry::{desired_hooks, InterceptionHost, InterceptorRegistry, ReconcileReport};
use crate::store::{load_effective, ConfigStore, LoadOutcome, LoadSource};
use crate::types::{FilterAction, Header, ResourceType};

/// Log target for everything the engine emits.
pub const LOG_TARGET: &str = "mockify";

/// One immutable configuration generation.
#[derive(Debug)]
pub struct EngineState {
    pub config: EffectiveConfig,
    pub blocklist: Blocklist,
}

impl EngineState {
    pub fn new(config: EffectiveConfig) -> Self {
        let blocklist = Blocklist::compile(&config);
        Self { config, blocklist }
    }
}

/// Process-wide handle to the current `EngineState`. Cheap to clone; every
/// hook holds one.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<EngineState>>>,
}

impl SharedConfig {
    pub fn new(state: EngineState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(state))),
        }
    }

    /// The current generation.
    pub fn load(&self) -> Arc<EngineState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, state: Arc<EngineState>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Request-headers hook body.
    pub fn on_before_send_headers(&self, url: &str, headers: Vec<Header>) -> Vec<Header> {
        let state = self.load();
        if state.config.flags.debug_mode {
            debug!(target: LOG_TARGET, "Modifying request headers of {}", url);
        }
        mutate_request_headers(&state.config, url, headers)
    }

    /// Response-headers hook body.
    pub fn on_headers_received(&self, url: &str, headers: Vec<Header>) -> Vec<Header> {
        let state = self.load();
        if state.config.flags.debug_mode {
            debug!(target: LOG_TARGET, "Modifying response headers of {}", url);
        }
        mutate_response_headers(&state.config, headers)
    }

    /// URL-block hook body.
    pub fn on_before_request(&self, url: &str, resource_type: ResourceType) -> FilterAction {
        let state = self.load();
        let action = state.blocklist.classify(url, resource_type);
        if state.config.flags.debug_mode && action != FilterAction::Allow {
            debug!(target: LOG_TARGET, "{:?} {} ({:?})", action, url, resource_type);
        }
        action
    }
}

/// The mediation engine, generic over the interception host.
pub struct MediationEngine<H> {
    host: H,
    options: EngineOptions,
    registry: InterceptorRegistry,
    shared: SharedConfig,
    /// Set once a configuration came from the store rather than the fallback.
    loaded: bool,
}

impl<H: InterceptionHost> MediationEngine<H> {
    /// No hook is installed until the first `apply`/`reload`. Until then the
    /// shared snapshot holds the fallback configuration.
    pub fn new(host: H, options: EngineOptions) -> Self {
        Self {
            host,
            options,
            registry: InterceptorRegistry::new(),
            shared: SharedConfig::new(EngineState::new(EffectiveConfig::fallback())),
            loaded: false,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn registry(&self) -> &InterceptorRegistry {
        &self.registry
    }

    /// Handle for hooks.
    pub fn shared(&self) -> SharedConfig {
        self.shared.clone()
    }

    pub fn snapshot(&self) -> Arc<EngineState> {
        self.shared.load()
    }

    /// First load after startup. Same as `reload`; a store that is empty,
    /// partial or unreadable still leaves the engine running.
    pub async fn initialize<S: ConfigStore>(&mut self, store: &S) -> LoadSource {
        self.reload(store).await
    }

    /// Load from the store and apply.
    pub async fn reload<S: ConfigStore>(&mut self, store: &S) -> LoadSource {
        let outcome = load_effective(store, &self.options).await;
        let source = outcome.source.clone();
        self.apply_loaded(outcome);
        source
    }

    /// Apply the result of `load_effective`. A failed read only takes effect
    /// before anything was loaded; afterwards the last loaded configuration
    /// stays in place and `None` is returned.
    pub fn apply_loaded(&mut self, outcome: LoadOutcome) -> Option<ReconcileReport> {
        if outcome.source != LoadSource::Fallback {
            return Some(self.apply(outcome.config));
        }
        if self.loaded {
            warn!(target: LOG_TARGET, "Keeping last loaded configuration");
            return None;
        }
        Some(self.swap(outcome.config))
    }

    /// Swap in `config` and reconcile hooks against it.
    pub fn apply(&mut self, config: EffectiveConfig) -> ReconcileReport {
        self.loaded = true;
        self.swap(config)
    }

    fn swap(&mut self, config: EffectiveConfig) -> ReconcileReport {
        let state = Arc::new(EngineState::new(config));
        self.shared.replace(Arc::clone(&state));

        let desired = desired_hooks(&state.config, &state.blocklist);
        self.registry.reconcile(&desired, &mut self.host)
    }

    pub async fn handle_message<S: ConfigStore>(&mut self, store: &S, message: Message) -> Reply {
        match message {
            Message::Reload => {
                self.reload(store).await;
                Reply::Ack
            }
            Message::GetConfig => Reply::Config(Box::new(self.snapshot().config.clone())),
        }
    }

    pub fn on_before_send_headers(&self, url: &str, headers: Vec<Header>) -> Vec<Header> {
        self.shared.on_before_send_headers(url, headers)
    }

    pub fn on_headers_received(&self, url: &str, headers: Vec<Header>) -> Vec<Header> {
        self.shared.on_headers_received(url, headers)
    }

    pub fn on_before_request(&self, url: &str, resource_type: ResourceType) -> FilterAction {
        self.shared.on_before_request(url, resource_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneralSettings;
    use crate::mode::{resolve, Mode};
    use crate::registry::tests::RecordingHost;

    fn engine() -> MediationEngine<RecordingHost> {
        MediationEngine::new(RecordingHost::default(), EngineOptions::default())
    }

    #[test]
    fn test_new_engine_installs_nothing() {
        let engine = engine();
        assert!(engine.registry().active_ids().is_empty());
        assert_eq!(engine.host().install_calls, 0);
    }

    #[test]
    fn test_held_snapshot_survives_reconfiguration() {
        let mut engine = engine();
        engine.apply(resolve(Mode::Normal, &GeneralSettings::default()));
        let shared = engine.shared();

        let in_flight = shared.load();
        engine.apply(resolve(Mode::Off, &GeneralSettings::default()));

        assert_eq!(in_flight.config.mode, Mode::Normal);
        assert_eq!(shared.load().config.mode, Mode::Off);
    }

    #[test]
    fn test_hooks_follow_applied_config() {
        let mut engine = engine();
        engine.apply(resolve(Mode::Aggressive, &GeneralSettings::default()));
        let hooks = engine.registry().active_ids().len();
        assert!(hooks > 0);
        assert_eq!(engine.host().installed.len(), hooks);

        let report = engine.apply(resolve(Mode::Off, &GeneralSettings::default()));
        assert_eq!(report.removed.len(), hooks);
        assert!(engine.host().installed.is_empty());
    }

    #[test]
    fn test_hook_bodies_read_current_snapshot() {
        let mut engine = engine();
        let mut general = GeneralSettings::default();
        general.alt_user_agent = "Y".to_string();
        engine.apply(resolve(Mode::Normal, &general));

        let out = engine.on_before_send_headers("https://example.com/", vec![Header::new("User-Agent", "X")]);
        assert_eq!(out[0], Header::new("User-Agent", "Y"));

        engine.apply(resolve(Mode::Off, &general));
        let out = engine.on_before_send_headers("https://example.com/", vec![Header::new("User-Agent", "X")]);
        assert_eq!(out, vec![Header::new("User-Agent", "X")]);
    }

    #[test]
    fn test_fallback_only_applies_before_first_load() {
        let fallback = || LoadOutcome {
            config: resolve(Mode::Aggressive, &GeneralSettings::default()),
            source: LoadSource::Fallback,
        };

        let mut engine = engine();
        assert!(engine.apply_loaded(fallback()).is_some());
        assert_eq!(engine.snapshot().config.mode, Mode::Aggressive);

        let report = engine.apply_loaded(LoadOutcome {
            config: resolve(Mode::Off, &GeneralSettings::default()),
            source: LoadSource::Stored,
        });
        assert!(report.is_some());

        assert!(engine.apply_loaded(fallback()).is_none());
        assert_eq!(engine.snapshot().config.mode, Mode::Off);
        assert!(engine.host().installed.is_empty());
    }
}
