//! IntegrationOrchestrator: drives the per-provider flows for one chat session.
//!
//! Every provider shares the same state machine, parametrised by its
//! [`ProviderBehavior`](crate::provider::ProviderBehavior). Network calls never
//! run under the state lock; each completion carries the generation it was
//! started with and is dropped if the provider has since been restarted or
//! cancelled.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::backend::IntegrationBackend;
use crate::conversation::{ConversationSink, InlineTranscript, InteractionTracker};
use crate::design_url::{DesignTarget, DesignUrlParser};
use crate::error::{BackendError, Error, ImportError};
use crate::flow::state::ProviderSlot;
use crate::flow::{FailureKind, FlowState, FlowStep, classify_error};
use crate::flow::{describe_design_link, describe_resource};
use crate::provider::{ListingKind, ProviderId};
use crate::redirect::RedirectMarkerStore;
use crate::resources::{FetchOutcome, Resource, ResourceFetcher};
use crate::status::{ConnectionSnapshot, ConnectionStatusChecker};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// State changes published to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// A provider's flow state changed.
    StateChanged {
        provider: ProviderId,
        state: FlowState,
    },
    /// The resource picker was opened or closed.
    PickerToggled { open: bool },
    /// The connection snapshot changed.
    SnapshotUpdated { snapshot: ConnectionSnapshot },
}

/// Collaborators of the orchestrator.
pub struct OrchestratorDeps {
    pub backend: Arc<dyn IntegrationBackend>,
    pub redirects: RedirectMarkerStore,
    pub design_urls: DesignUrlParser,
    pub conversation: Arc<dyn ConversationSink>,
    pub interaction: Option<Arc<dyn InteractionTracker>>,
    pub inline: Option<Arc<dyn InlineTranscript>>,
}

/// How a flow attempt ended, before it is applied to the state.
enum Resolution {
    Connect { message: String },
    Install { install_url: String },
    Select { resources: Vec<Resource> },
    Failed { error: String },
}

struct Inner {
    slots: BTreeMap<ProviderId, ProviderSlot>,
    active: Option<ProviderId>,
    picker_open: bool,
    snapshot: ConnectionSnapshot,
}

impl Inner {
    fn slot(&mut self, provider: ProviderId) -> &mut ProviderSlot {
        self.slots.entry(provider).or_default()
    }
}

/// Top-level integration object for a chat session.
pub struct IntegrationOrchestrator {
    inner: RwLock<Inner>,
    backend: Arc<dyn IntegrationBackend>,
    status: ConnectionStatusChecker,
    fetcher: ResourceFetcher,
    redirects: RedirectMarkerStore,
    design_urls: DesignUrlParser,
    conversation: Arc<dyn ConversationSink>,
    interaction: Option<Arc<dyn InteractionTracker>>,
    inline: Option<Arc<dyn InlineTranscript>>,
    tx: broadcast::Sender<FlowEvent>,
}

impl IntegrationOrchestrator {
    /// Create an orchestrator with every provider idle.
    pub fn new(deps: OrchestratorDeps) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let slots = ProviderId::ALL
            .into_iter()
            .map(|p| (p, ProviderSlot::default()))
            .collect();

        Arc::new(Self {
            inner: RwLock::new(Inner {
                slots,
                active: None,
                picker_open: false,
                snapshot: ConnectionSnapshot::default(),
            }),
            status: ConnectionStatusChecker::new(Arc::clone(&deps.backend)),
            fetcher: ResourceFetcher::new(Arc::clone(&deps.backend)),
            backend: deps.backend,
            redirects: deps.redirects,
            design_urls: deps.design_urls,
            conversation: deps.conversation,
            interaction: deps.interaction,
            inline: deps.inline,
            tx,
        })
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.tx.subscribe()
    }

    fn emit(&self, event: FlowEvent) {
        // ok if nobody is listening
        let _ = self.tx.send(event);
    }

    fn emit_state(&self, provider: ProviderId, state: &FlowState) {
        self.emit(FlowEvent::StateChanged {
            provider,
            state: state.clone(),
        });
    }

    fn mark_interacted(&self) {
        if let Some(ref tracker) = self.interaction {
            tracker.mark_user_interacted();
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn flow_state(&self, provider: ProviderId) -> FlowState {
        let inner = self.inner.read().await;
        inner
            .slots
            .get(&provider)
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    pub async fn flow_states(&self) -> BTreeMap<ProviderId, FlowState> {
        let inner = self.inner.read().await;
        inner
            .slots
            .iter()
            .map(|(p, s)| (*p, s.state.clone()))
            .collect()
    }

    pub async fn active_provider(&self) -> Option<ProviderId> {
        self.inner.read().await.active
    }

    pub async fn is_picker_open(&self) -> bool {
        self.inner.read().await.picker_open
    }

    pub async fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Resources fetched for the provider's current `Select` step.
    pub async fn resources(&self, provider: ProviderId) -> Vec<Resource> {
        let inner = self.inner.read().await;
        inner
            .slots
            .get(&provider)
            .map(|s| s.resources.clone())
            .unwrap_or_default()
    }

    /// Fetched resources filtered by the provider's search text.
    pub async fn visible_resources(&self, provider: ProviderId) -> Vec<Resource> {
        let inner = self.inner.read().await;
        let Some(slot) = inner.slots.get(&provider) else {
            return Vec::new();
        };
        slot.resources
            .iter()
            .filter(|r| r.matches_search(&slot.search_text))
            .cloned()
            .collect()
    }

    /// Continuation URL for the install step, while in it.
    pub async fn install_url(&self, provider: ProviderId) -> Option<String> {
        let inner = self.inner.read().await;
        inner.slots.get(&provider)?.install_url.clone()
    }

    // ── Picker ──────────────────────────────────────────────────────

    pub async fn open_picker(&self) {
        self.mark_interacted();
        let mut inner = self.inner.write().await;
        inner.picker_open = true;
        self.emit(FlowEvent::PickerToggled { open: true });
    }

    pub async fn close_picker(&self) {
        let mut inner = self.inner.write().await;
        if inner.picker_open {
            inner.picker_open = false;
            self.emit(FlowEvent::PickerToggled { open: false });
        }
    }

    /// Update the search text of a provider that is showing resources.
    pub async fn set_search_text(&self, provider: ProviderId, text: &str) -> bool {
        let mut inner = self.inner.write().await;
        let slot = inner.slot(provider);
        if slot.state.step != FlowStep::Select {
            return false;
        }
        slot.search_text = text.to_string();
        true
    }

    // ── Connection status ───────────────────────────────────────────

    /// Re-check every provider's connection and publish the new snapshot.
    pub async fn check_connections(&self) -> ConnectionSnapshot {
        let previous = {
            let mut inner = self.inner.write().await;
            inner.snapshot.loading = true;
            self.emit(FlowEvent::SnapshotUpdated {
                snapshot: inner.snapshot.clone(),
            });
            inner.snapshot.clone()
        };

        let snapshot = self.status.check_all(&previous).await;

        let mut inner = self.inner.write().await;
        inner.snapshot = snapshot.clone();
        self.emit(FlowEvent::SnapshotUpdated {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    // ── Redirects ───────────────────────────────────────────────────

    /// Resume the flow the user left for an authorization page, if any.
    ///
    /// Only the first call does anything.
    pub async fn resume_pending_redirect(&self) -> Option<ProviderId> {
        let pending = self.redirects.consume_pending_redirect()?;
        info!(
            provider = %pending.provider,
            source = ?pending.source,
            "Resuming flow after redirect"
        );
        self.start_flow(pending.provider).await;
        Some(pending.provider)
    }

    /// Get the authorization URL for `provider` and record the redirect
    /// marker. The caller navigates to the returned URL.
    pub async fn begin_authorization(&self, provider: ProviderId) -> Result<String, Error> {
        let url = self.backend.authorization_url(provider).await?;
        self.redirects.write_marker(provider)?;
        info!(provider = %provider, "Authorization started");
        Ok(url)
    }

    // ── Flow ────────────────────────────────────────────────────────

    /// Start (or restart) `provider`'s flow.
    ///
    /// `Loading` is published before any network call. If the flow is
    /// restarted or cancelled while this call is pending, its result is
    /// dropped.
    pub async fn start_flow(&self, provider: ProviderId) {
        self.mark_interacted();
        let behavior = provider.behavior();

        let generation = {
            let mut inner = self.inner.write().await;
            self.release_others(&mut inner, provider);
            inner.active = Some(provider);

            let slot = inner.slot(provider);
            slot.generation += 1;
            slot.enter(FlowState::new(FlowStep::Loading, behavior.loading_message()));
            self.emit_state(provider, &slot.state);
            slot.generation
        };
        info!(provider = %provider, generation, "Flow started");

        let resolution = self.resolve(provider).await;
        self.apply(provider, generation, resolution).await;
    }

    /// Make room for `provider`'s flow: providers mid-flow or holding an error
    /// are reset, idle ones only drop their transient data.
    fn release_others(&self, inner: &mut Inner, provider: ProviderId) {
        for (other, slot) in inner.slots.iter_mut() {
            if *other == provider {
                continue;
            }
            if slot.state.step == FlowStep::Idle && slot.state.error.is_none() {
                slot.clear_transient();
            } else {
                slot.reset();
                self.emit_state(*other, &slot.state);
            }
        }
    }

    async fn resolve(&self, provider: ProviderId) -> Resolution {
        let behavior = provider.behavior();

        match self.status.check(provider).await {
            Ok(true) => {}
            Ok(false) => {
                return Resolution::Connect {
                    message: behavior.connect_message(),
                };
            }
            Err(e) => return self.resolve_failure(provider, &e),
        }

        if behavior.listing == ListingKind::PastedUrl {
            return Resolution::Select {
                resources: Vec::new(),
            };
        }

        match self.fetcher.list(provider).await {
            Ok(FetchOutcome::Resources(resources)) => Resolution::Select { resources },
            Ok(FetchOutcome::InstallationRequired { install_url }) => {
                if behavior.supports_install {
                    Resolution::Install { install_url }
                } else {
                    warn!(
                        provider = %provider,
                        "Installation requested for provider without install step"
                    );
                    Resolution::Failed {
                        error: generic_error(provider),
                    }
                }
            }
            Err(e) => self.resolve_failure(provider, &e),
        }
    }

    fn resolve_failure(&self, provider: ProviderId, err: &BackendError) -> Resolution {
        let behavior = provider.behavior();
        match classify_error(err) {
            FailureKind::NeedsInstall { install_url } if behavior.supports_install => {
                Resolution::Install { install_url }
            }
            FailureKind::SessionExpired => {
                info!(provider = %provider, error = %err, "Session expired");
                Resolution::Connect {
                    message: behavior.expired_message(),
                }
            }
            _ => {
                warn!(provider = %provider, error = %err, "Flow failed");
                Resolution::Failed {
                    error: generic_error(provider),
                }
            }
        }
    }

    async fn apply(&self, provider: ProviderId, generation: u64, resolution: Resolution) {
        let behavior = provider.behavior();
        let state = {
            let mut inner = self.inner.write().await;
            let slot = inner.slot(provider);
            if slot.generation != generation {
                debug!(
                    provider = %provider,
                    generation,
                    current = slot.generation,
                    "Dropping stale flow completion"
                );
                return;
            }

            match resolution {
                Resolution::Connect { message } => {
                    slot.enter(FlowState::new(FlowStep::Connect, message));
                }
                Resolution::Install { install_url } => {
                    slot.enter(FlowState::new(FlowStep::Install, behavior.install_message()));
                    slot.install_url = Some(install_url);
                }
                Resolution::Select { resources } => {
                    slot.enter(FlowState::new(FlowStep::Select, behavior.select_message()));
                    slot.resources = resources;
                }
                Resolution::Failed { error } => {
                    slot.enter(FlowState::failed(FlowStep::Idle, "", error));
                }
            }
            self.emit_state(provider, &slot.state);
            slot.state.clone()
        };
        info!(provider = %provider, step = %state.step, error = ?state.error, "Flow resolved");

        if provider == ProviderId::DesignHost {
            self.announce_design_step(&state).await;
        }
    }

    /// Mirror the design provider's user-facing steps into the transcript.
    async fn announce_design_step(&self, state: &FlowState) {
        let Some(ref inline) = self.inline else {
            return;
        };
        let kind = match state.step {
            FlowStep::Connect => "design_connect",
            FlowStep::Select => "design_url_input",
            _ => return,
        };
        inline
            .add_inline_message(
                state.message.clone(),
                serde_json::json!({
                    "kind": kind,
                    "provider": ProviderId::DesignHost,
                }),
            )
            .await;
    }

    /// Hand the chosen resource to the conversation.
    ///
    /// Only valid while its provider is in `Select`; returns whether the
    /// handoff happened.
    pub async fn select_resource(&self, resource: Resource) -> bool {
        let provider = resource.provider();
        {
            let mut inner = self.inner.write().await;
            let slot = inner.slot(provider);
            if slot.state.step != FlowStep::Select {
                warn!(
                    provider = %provider,
                    step = %slot.state.step,
                    "Cannot select outside select step"
                );
                return false;
            }
            slot.enter(FlowState::new(
                FlowStep::Importing,
                format!("Importing {}...", resource.name()),
            ));
            self.emit_state(provider, &slot.state);
            self.finish(&mut inner, provider);
        }

        let text = describe_resource(&resource);
        info!(
            provider = %provider,
            resource = %resource.name(),
            "Resource handed to conversation"
        );
        self.conversation.send_to_conversation(text).await;
        true
    }

    /// Reset `provider` after a successful handoff.
    fn finish(&self, inner: &mut Inner, provider: ProviderId) {
        if inner.active == Some(provider) {
            inner.active = None;
        }
        let slot = inner.slot(provider);
        slot.reset();
        self.emit_state(provider, &slot.state);
    }

    /// Reset every provider, close the picker and clear the active provider.
    pub async fn cancel_flow(&self) {
        let mut inner = self.inner.write().await;
        for (provider, slot) in inner.slots.iter_mut() {
            let was_default = slot.state.is_default();
            slot.reset();
            if !was_default {
                self.emit_state(*provider, &slot.state);
            }
        }
        inner.active = None;
        if inner.picker_open {
            inner.picker_open = false;
            self.emit(FlowEvent::PickerToggled { open: false });
        }
        debug!("Flows cancelled");
    }

    // ── Design links ────────────────────────────────────────────────

    /// Import a pasted design link.
    ///
    /// Slides and published sites are handed off without a preview. Failures
    /// are stored in the design flow state and also returned, so a caller
    /// rendering the flow inline can show them in the same turn.
    pub async fn import_url_flow(&self, input: &str) -> Result<(), ImportError> {
        let provider = ProviderId::DesignHost;

        let target = match self.design_urls.parse(input) {
            Ok(target) => target,
            Err(e) => {
                let mut inner = self.inner.write().await;
                let slot = inner.slot(provider);
                let step = slot.state.step;
                slot.state = FlowState::failed(step, invalid_url_message(), e.to_string());
                self.emit_state(provider, &slot.state);
                debug!(input = %input, "Rejected design link");
                return Err(e);
            }
        };

        let generation = {
            let mut inner = self.inner.write().await;
            self.release_others(&mut inner, provider);
            inner.active = Some(provider);
            let slot = inner.slot(provider);
            slot.generation += 1;
            slot.enter(FlowState::new(
                FlowStep::Importing,
                format!("Importing {}...", target.kind.label()),
            ));
            self.emit_state(provider, &slot.state);
            let generation = slot.generation;
            if target.kind.skips_preview() {
                self.finish(&mut inner, provider);
            }
            generation
        };
        info!(kind = %target.kind, generation, "Design link import started");

        if target.kind.skips_preview() {
            self.conversation
                .send_to_conversation(describe_design_link(&target))
                .await;
            return Ok(());
        }

        self.import_with_preview(target, generation).await
    }

    async fn import_with_preview(
        &self,
        target: DesignTarget,
        generation: u64,
    ) -> Result<(), ImportError> {
        let provider = ProviderId::DesignHost;
        let outcome = self.fetcher.preview(provider, &target).await;

        let mut inner = self.inner.write().await;
        let current = inner.slots.get(&provider).map(|s| s.generation);
        if current != Some(generation) {
            debug!(generation, "Dropping stale design preview");
            return Err(ImportError::Cancelled);
        }

        match outcome {
            Ok(file) => {
                self.finish(&mut inner, provider);
                drop(inner);
                let text = describe_resource(&Resource::DesignFile(file));
                self.conversation.send_to_conversation(text).await;
                Ok(())
            }
            Err(e) => {
                let behavior = provider.behavior();
                let (state, err) = match classify_error(&e) {
                    FailureKind::SessionExpired => (
                        FlowState::failed(
                            FlowStep::Connect,
                            behavior.expired_message(),
                            e.to_string(),
                        ),
                        ImportError::NotConnected,
                    ),
                    _ => (
                        FlowState::failed(
                            FlowStep::Idle,
                            "",
                            format!("Could not load that {}.", target.kind.label()),
                        ),
                        ImportError::PreviewFailed(e.to_string()),
                    ),
                };
                warn!(error = %e, "Design preview failed");

                let slot = inner.slot(provider);
                slot.enter(state);
                self.emit_state(provider, &slot.state);
                let state = slot.state.clone();
                drop(inner);
                self.announce_design_step(&state).await;
                Err(err)
            }
        }
    }
}

fn generic_error(provider: ProviderId) -> String {
    let behavior = provider.behavior();
    format!(
        "Something went wrong loading your {} {}. Please try again.",
        behavior.display_name, behavior.resource_plural
    )
}

fn invalid_url_message() -> String {
    format!(
        "That doesn't look like a valid {} link. Paste a link to a file, prototype, board, slide deck or site.",
        ProviderId::DesignHost.display_name()
    )
}
