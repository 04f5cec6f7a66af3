//! Integrations backend abstraction.
//!
//! The flow core only ever talks to the backend through [`IntegrationBackend`].
//! [`HttpBackend`] is the reqwest implementation; tests use in-process stubs.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::design_url::DesignKind;
use crate::error::BackendError;
use crate::provider::ProviderId;

/// Raw result of a listing call, before provider-specific mapping.
#[derive(Debug, Clone)]
pub enum Listing {
    /// Provider-shaped records.
    Items(Vec<serde_json::Value>),
    /// Listing is gated behind a second grant.
    InstallationRequired { install_url: String },
}

/// Metadata returned by the design preview endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignPreview {
    pub name: String,
    #[serde(default)]
    pub page_count: Option<u32>,
}

/// Server-side half of the integration flows.
#[async_trait]
pub trait IntegrationBackend: Send + Sync {
    /// Whether the user has authorized `provider`.
    async fn connection_status(&self, provider: ProviderId) -> Result<bool, BackendError>;

    /// List importable resources for an authorized provider.
    async fn list_resources(&self, provider: ProviderId) -> Result<Listing, BackendError>;

    /// Fetch name and page count for one design file.
    async fn design_preview(
        &self,
        file_key: &str,
        kind: DesignKind,
    ) -> Result<DesignPreview, BackendError>;

    /// URL of the external authorization page for `provider`.
    async fn authorization_url(&self, provider: ProviderId) -> Result<String, BackendError>;
}
