//! End-to-end engine scenarios against in-memory collaborators.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use mk_core::config::{schema_keys, CONFIG_KEY};
use mk_core::error::HostError;
use mk_core::filter::{BLANK_DOCUMENT, TRANSPARENT_PIXEL};
use mk_core::inject::build_payload;
use mk_core::store::{LoadSource, MemoryStore};
use mk_core::{
    resolve, EngineOptions, FilterAction, GeneralSettings, Header, HookId, HookSpec, InterceptionHost,
    MediationEngine, Message, Mode, Reply, ResourceType,
};

#[derive(Debug, Default)]
struct CountingHost {
    installed: BTreeMap<HookId, HookSpec>,
    install_calls: usize,
}

impl InterceptionHost for CountingHost {
    fn install(&mut self, spec: &HookSpec) -> Result<(), HostError> {
        self.install_calls += 1;
        if self.installed.insert(spec.id, spec.clone()).is_some() {
            return Err(HostError::Install {
                hook: spec.id.name(),
                reason: "duplicate listener".to_string(),
            });
        }
        Ok(())
    }

    fn remove(&mut self, id: HookId) -> Result<(), HostError> {
        self.installed.remove(&id).map(|_| ()).ok_or(HostError::Remove {
            hook: id.name(),
            reason: "unknown listener".to_string(),
        })
    }
}

fn engine() -> MediationEngine<CountingHost> {
    MediationEngine::new(CountingHost::default(), EngineOptions::default())
}

fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_first_run_seeds_normal_baseline() {
    let store = MemoryStore::new();
    let mut engine = engine();

    let source = engine.reload(&store).await;
    assert_eq!(source, LoadSource::Seeded);

    let stored = store.raw(CONFIG_KEY).expect("store seeded");
    let mut expected = schema_keys();
    expected.sort();
    assert_eq!(keys(&stored), expected);
    assert_eq!(stored["mode"], json!("normal"));
    assert_eq!(engine.snapshot().config, resolve(Mode::Normal, &GeneralSettings::default()));
}

#[tokio::test]
async fn test_persisted_config_round_trips_without_healing() {
    let config = resolve(Mode::Aggressive, &GeneralSettings::default());
    let store = MemoryStore::with_entry(CONFIG_KEY, config.to_json());
    let mut engine = engine();

    assert_eq!(engine.reload(&store).await, LoadSource::Stored);
    assert_eq!(engine.snapshot().config.flags, config.flags);
    assert_eq!(store.raw(CONFIG_KEY), Some(config.to_json()));
}

#[tokio::test]
async fn test_partial_object_is_healed_and_written_back() {
    let store = MemoryStore::with_entry(CONFIG_KEY, json!({ "mode": "aggressive", "debug_mode": true }));
    let mut engine = engine();

    let source = engine.reload(&store).await;
    assert!(matches!(source, LoadSource::Healed(ref repairs) if !repairs.is_empty()));

    let snapshot = engine.snapshot();
    assert!(snapshot.config.flags.debug_mode);
    assert!(snapshot.config.flags.mock_timezone);
    assert_eq!(store.raw(CONFIG_KEY), Some(snapshot.config.to_json()));

    // The healed object is complete, so the next load leaves it alone.
    assert_eq!(engine.reload(&store).await, LoadSource::Stored);
}

#[tokio::test]
async fn test_read_failure_runs_on_aggressive_baseline() {
    let store = MemoryStore::new().failing_reads();
    let mut engine = engine();

    assert_eq!(engine.reload(&store).await, LoadSource::Fallback);
    assert_eq!(engine.snapshot().config.mode, Mode::Aggressive);
    assert!(store.raw(CONFIG_KEY).is_none());
    assert!(engine.registry().is_active(HookId::RequestHeaders));
}

#[tokio::test]
async fn test_read_failure_after_load_keeps_last_config() {
    let mut general = GeneralSettings::default();
    general.alt_user_agent = "MyUA".to_string();
    general.block_url_patterns = vec!["*://my-tracker.example/*".to_string()];
    let stored = resolve(Mode::Normal, &general);
    let store = MemoryStore::with_entry(CONFIG_KEY, stored.to_json());
    let mut engine = engine();
    assert_eq!(engine.reload(&store).await, LoadSource::Stored);
    let active = engine.registry().active_ids();
    let installs = engine.host().install_calls;

    let broken = MemoryStore::new().failing_reads();
    assert_eq!(engine.reload(&broken).await, LoadSource::Fallback);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.config, stored);
    assert_eq!(snapshot.config.general.alt_user_agent, "MyUA");
    assert_eq!(engine.registry().active_ids(), active);
    assert_eq!(engine.host().install_calls, installs);

    let out = engine.on_before_send_headers("https://example.com/", vec![Header::new("User-Agent", "X")]);
    assert_eq!(out[0], Header::new("User-Agent", "MyUA"));
}

#[tokio::test]
async fn test_write_failure_keeps_in_memory_config() {
    let store = MemoryStore::new().failing_writes();
    let mut engine = engine();

    assert_eq!(engine.reload(&store).await, LoadSource::Seeded);
    assert_eq!(engine.snapshot().config.mode, Mode::Normal);
    assert!(store.raw(CONFIG_KEY).is_none());
}

#[tokio::test]
async fn test_repeated_reload_does_not_duplicate_hooks() {
    let store = MemoryStore::new();
    let mut engine = engine();

    engine.reload(&store).await;
    let installs = engine.host().install_calls;
    let active = engine.registry().active_ids();

    engine.reload(&store).await;
    engine.handle_message(&store, Message::Reload).await;

    assert_eq!(engine.host().install_calls, installs);
    assert_eq!(engine.registry().active_ids(), active);
    assert_eq!(engine.host().installed.len(), active.len());
}

#[tokio::test]
async fn test_settings_ui_switching_to_off_tears_down_everything() {
    let store = MemoryStore::new();
    let mut engine = engine();
    engine.reload(&store).await;
    assert!(!engine.registry().active_ids().is_empty());

    // The settings UI writes the store, then asks for a reload.
    store.insert(CONFIG_KEY, resolve(Mode::Off, &GeneralSettings::default()).to_json());
    assert_eq!(engine.handle_message(&store, Message::Reload).await, Reply::Ack);

    assert!(engine.registry().active_ids().is_empty());
    assert!(engine.host().installed.is_empty());

    let reply = engine.handle_message(&store, Message::GetConfig).await;
    let Reply::Config(config) = reply else {
        panic!("expected a config reply");
    };
    assert_eq!(config.mode, Mode::Off);
    assert!(build_payload(&config).is_none());

    let headers = vec![Header::new("User-Agent", "X")];
    assert_eq!(engine.on_before_send_headers("https://example.com/", headers.clone()), headers);
}

#[tokio::test]
async fn test_blocklist_actions_follow_resource_type() {
    let mut general = GeneralSettings::default();
    general.block_url_patterns = vec!["*://tracker.example/*".to_string()];
    let store = MemoryStore::with_entry(CONFIG_KEY, resolve(Mode::Aggressive, &general).to_json());
    let mut engine = engine();
    engine.reload(&store).await;

    let url = "https://tracker.example/collect";
    assert_eq!(
        engine.on_before_request(url, ResourceType::IMAGE),
        FilterAction::Redirect(TRANSPARENT_PIXEL)
    );
    assert_eq!(
        engine.on_before_request(url, ResourceType::SUB_FRAME),
        FilterAction::Redirect(BLANK_DOCUMENT)
    );
    assert_eq!(engine.on_before_request(url, ResourceType::SCRIPT), FilterAction::Cancel);
    assert_eq!(
        engine.on_before_request("wss://tracker.example/live", ResourceType::WEBSOCKET),
        FilterAction::Cancel
    );
    assert_eq!(
        engine.on_before_request("https://example.com/", ResourceType::MAIN_FRAME),
        FilterAction::Allow
    );

    let ws = &engine.host().installed[&HookId::BlockWebSockets];
    assert_eq!(ws.urls, vec!["ws://tracker.example/*", "wss://tracker.example/*"]);
}
