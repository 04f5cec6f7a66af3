//! Integration flows: connect content providers and hand their resources to
//! a conversation.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod design_url;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod provider;
pub mod redirect;
pub mod resources;
pub mod status;

pub use error::{Error, Result};
pub use orchestrator::{FlowEvent, IntegrationOrchestrator, OrchestratorDeps};
pub use provider::ProviderId;
