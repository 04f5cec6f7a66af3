//! Per-provider flow state machine pieces.

pub mod failure;
pub mod handoff;
pub mod state;

pub use failure::{FailureKind, classify_error, classify_failure};
pub use handoff::{describe_design_link, describe_resource};
pub use state::{FlowState, FlowStep};
