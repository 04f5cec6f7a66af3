//! Collaborators on the conversation side of the handoff.

use async_trait::async_trait;

/// Receives the description of a chosen resource.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    /// Called exactly once per successful selection.
    async fn send_to_conversation(&self, text: String);
}

/// Notified whenever the user starts a flow or opens the picker.
pub trait InteractionTracker: Send + Sync {
    fn mark_user_interacted(&self);
}

/// Injects assistant turns straight into the transcript.
#[async_trait]
pub trait InlineTranscript: Send + Sync {
    async fn add_inline_message(&self, text: String, metadata: serde_json::Value);
}
