//! Per-provider flow state.

use serde::{Deserialize, Serialize};

use crate::resources::Resource;

/// Steps of a provider's integration flow.
///
/// Progresses Idle → Loading → {Connect | Install | Select} → Importing → Idle.
/// Any step may restart at Loading when a new flow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    #[default]
    Idle,
    Loading,
    Connect,
    Install,
    Select,
    Importing,
}

impl FlowStep {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: FlowStep) -> bool {
        use FlowStep::*;
        matches!(
            (self, target),
            (_, Loading)
                | (Loading, Connect)
                | (Loading, Install)
                | (Loading, Select)
                | (Loading, Idle)
                | (Idle, Importing)
                | (Select, Importing)
                | (Importing, Idle)
                | (Importing, Connect)
        )
    }

    /// Steps that wait on the user rather than the network.
    pub fn awaits_user(&self) -> bool {
        matches!(self, Self::Connect | Self::Install | Self::Select)
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Connect => "connect",
            Self::Install => "install",
            Self::Select => "select",
            Self::Importing => "importing",
        };
        write!(f, "{s}")
    }
}

/// What the UI shows for one provider.
///
/// `error` may be set while `step` is still a healthy value: a failed attempt
/// stays anchored on its step so a retry can be offered in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowState {
    pub step: FlowStep,
    pub message: String,
    pub error: Option<String>,
}

impl FlowState {
    pub fn new(step: FlowStep, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(step: FlowStep, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything the orchestrator tracks for one provider.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProviderSlot {
    pub state: FlowState,
    /// Bumped on every start and cancel; completions carrying an older value
    /// are dropped.
    pub generation: u64,
    /// Resources fetched for the current `Select` step.
    pub resources: Vec<Resource>,
    pub search_text: String,
    /// Continuation URL captured when entering `Install`.
    pub install_url: Option<String>,
}

impl ProviderSlot {
    /// Drop everything that only lives for the duration of a `Select` step.
    pub fn clear_transient(&mut self) {
        self.resources.clear();
        self.search_text.clear();
        self.install_url = None;
    }

    /// Move to a new state, discarding transient data when leaving `Select`.
    pub fn enter(&mut self, state: FlowState) {
        if !self.state.step.can_transition_to(state.step) {
            tracing::debug!(
                from = %self.state.step,
                to = %state.step,
                "Unexpected flow transition"
            );
        }
        if state.step != FlowStep::Select {
            self.resources.clear();
            self.search_text.clear();
        }
        if state.step != FlowStep::Install {
            self.install_url = None;
        }
        self.state = state;
    }

    /// Return to the default state and invalidate in-flight work.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.clear_transient();
        self.state = FlowState::default();
    }
}
