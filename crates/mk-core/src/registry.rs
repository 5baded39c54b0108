//! Interceptor lifecycle
//!
//! The registry owns the set of hooks currently installed on the host.
//! Applying a configuration computes the full desired set, diffs it against
//! the tracked set and issues only the install/remove calls that differ, so
//! reapplying an unchanged configuration is a no-op.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::config::EffectiveConfig;
use crate::engine::LOG_TARGET;
use crate::error::HostError;
use crate::filter::Blocklist;
use crate::pattern::ALL_URLS;
use crate::types::ResourceType;

/// Phase of the request lifecycle a hook attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Request headers are about to be sent
    BeforeSendHeaders,
    /// Response headers arrived
    HeadersReceived,
    /// Request is about to be made
    BeforeRequest,
}

impl Phase {
    /// Host event name.
    pub fn event_name(self) -> &'static str {
        match self {
            Phase::BeforeSendHeaders => "onBeforeSendHeaders",
            Phase::HeadersReceived => "onHeadersReceived",
            Phase::BeforeRequest => "onBeforeRequest",
        }
    }

    /// Extra info the host needs to allow a blocking mutation.
    pub fn extra_info(self) -> &'static [&'static str] {
        match self {
            Phase::BeforeSendHeaders => &["blocking", "requestHeaders"],
            Phase::HeadersReceived => &["blocking", "responseHeaders"],
            Phase::BeforeRequest => &["blocking"],
        }
    }
}

/// Identity of a hook. At most one hook per identity is ever installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookId {
    RequestHeaders,
    ResponseHeaders,
    BlockImages,
    BlockSubFrames,
    BlockOther,
    BlockWebSockets,
}

impl HookId {
    pub const ALL: [HookId; 6] = [
        HookId::RequestHeaders,
        HookId::ResponseHeaders,
        HookId::BlockImages,
        HookId::BlockSubFrames,
        HookId::BlockOther,
        HookId::BlockWebSockets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HookId::RequestHeaders => "requestHeaders",
            HookId::ResponseHeaders => "responseHeaders",
            HookId::BlockImages => "blockImages",
            HookId::BlockSubFrames => "blockSubFrames",
            HookId::BlockOther => "blockOther",
            HookId::BlockWebSockets => "blockWebSockets",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            HookId::RequestHeaders => Phase::BeforeSendHeaders,
            HookId::ResponseHeaders => Phase::HeadersReceived,
            _ => Phase::BeforeRequest,
        }
    }
}

/// Everything the host needs to register one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub id: HookId,
    /// Match patterns for the host's URL filter. Never empty.
    pub urls: Vec<String>,
    pub types: ResourceType,
}

impl HookSpec {
    fn new(id: HookId, urls: Vec<String>, types: ResourceType) -> Self {
        Self { id, urls, types }
    }
}

/// The network-interception collaborator.
pub trait InterceptionHost {
    fn install(&mut self, spec: &HookSpec) -> Result<(), HostError>;
    fn remove(&mut self, id: HookId) -> Result<(), HostError>;
}

/// Hooks that should be installed for `config`.
///
/// | condition                   | header hooks | URL-block hooks |
/// |-----------------------------|--------------|-----------------|
/// | mode = OFF                  | none         | none            |
/// | flag on                     | installed    | installed       |
/// | flag off                    | none         | none            |
///
/// A block hook whose pattern list would be empty is left out: the host
/// reads an empty URL filter as "match everything".
pub fn desired_hooks(config: &EffectiveConfig, blocklist: &Blocklist) -> BTreeMap<HookId, HookSpec> {
    let mut desired = BTreeMap::new();
    if !config.is_active() {
        return desired;
    }

    let all_urls = || vec![ALL_URLS.to_string()];
    let mut add = |spec: HookSpec| {
        desired.insert(spec.id, spec);
    };

    if config.flags.touches_request_headers() {
        add(HookSpec::new(HookId::RequestHeaders, all_urls(), ResourceType::ALL));
    }
    if config.flags.mock_user_agent {
        add(HookSpec::new(HookId::ResponseHeaders, all_urls(), ResourceType::ALL));
    }

    if blocklist.is_enabled() {
        let urls: Vec<String> = blocklist.patterns().iter().map(|p| p.as_str().to_string()).collect();
        if !urls.is_empty() {
            add(HookSpec::new(HookId::BlockImages, urls.clone(), ResourceType::IMAGES));
            add(HookSpec::new(HookId::BlockSubFrames, urls.clone(), ResourceType::SUB_FRAME));
            add(HookSpec::new(HookId::BlockOther, urls, ResourceType::BLOCKED_OUTRIGHT));
        }

        let ws_urls: Vec<String> = blocklist
            .websocket_patterns()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        if !ws_urls.is_empty() {
            add(HookSpec::new(HookId::BlockWebSockets, ws_urls, ResourceType::WEBSOCKET));
        }
    }

    desired
}

/// One host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOp {
    Install(HookSpec),
    Remove(HookId),
}

/// Summary of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub installed: Vec<HookId>,
    pub removed: Vec<HookId>,
    pub failures: Vec<HostError>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty() && self.removed.is_empty() && self.failures.is_empty()
    }
}

/// Tracks which hooks are installed on the host.
#[derive(Debug, Default)]
pub struct InterceptorRegistry {
    active: BTreeMap<HookId, HookSpec>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, id: HookId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_ids(&self) -> Vec<HookId> {
        self.active.keys().copied().collect()
    }

    /// Install `spec` unless a hook with its identity is already tracked.
    /// Returns whether `install` ran.
    pub fn ensure_active<F>(&mut self, spec: HookSpec, install: F) -> Result<bool, HostError>
    where
        F: FnOnce(&HookSpec) -> Result<(), HostError>,
    {
        if self.active.contains_key(&spec.id) {
            return Ok(false);
        }
        install(&spec)?;
        self.active.insert(spec.id, spec);
        Ok(true)
    }

    /// Remove the hook `id` if it is tracked. A failed removal keeps it
    /// tracked so the next pass tries again. Returns whether `remove` ran.
    pub fn ensure_inactive<F>(&mut self, id: HookId, remove: F) -> Result<bool, HostError>
    where
        F: FnOnce(HookId) -> Result<(), HostError>,
    {
        if !self.active.contains_key(&id) {
            return Ok(false);
        }
        remove(id)?;
        self.active.remove(&id);
        Ok(true)
    }

    /// Operations turning the tracked set into `desired`. Removals come
    /// first; a hook whose filter changed is removed and installed again.
    pub fn plan(&self, desired: &BTreeMap<HookId, HookSpec>) -> Vec<HookOp> {
        let mut ops = Vec::new();
        for (id, spec) in &self.active {
            if desired.get(id) != Some(spec) {
                ops.push(HookOp::Remove(*id));
            }
        }
        for (id, spec) in desired {
            if self.active.get(id) != Some(spec) {
                ops.push(HookOp::Install(spec.clone()));
            }
        }
        ops
    }

    /// Apply `plan(desired)` to `host`. Host failures are collected, not
    /// propagated; the registry keeps tracking what actually happened.
    pub fn reconcile<H: InterceptionHost + ?Sized>(
        &mut self,
        desired: &BTreeMap<HookId, HookSpec>,
        host: &mut H,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for op in self.plan(desired) {
            match op {
                HookOp::Remove(id) => match self.ensure_inactive(id, |id| host.remove(id)) {
                    Ok(true) => report.removed.push(id),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(target: LOG_TARGET, "{}", e);
                        report.failures.push(e);
                    }
                },
                HookOp::Install(spec) => {
                    let id = spec.id;
                    match self.ensure_active(spec, |spec| host.install(spec)) {
                        Ok(true) => report.installed.push(id),
                        Ok(false) => {}
                        Err(e) => {
                            warn!(target: LOG_TARGET, "{}", e);
                            report.failures.push(e);
                        }
                    }
                }
            }
        }

        if !report.is_noop() {
            info!(
                target: LOG_TARGET,
                "Hooks reconciled: installed {:?}, removed {:?}, {} failures",
                report.installed,
                report.removed,
                report.failures.len()
            );
        }

        report
    }
}
