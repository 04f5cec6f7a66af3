//! Error types for integration flows.

use crate::provider::ProviderId;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Redirect marker error: {0}")]
    Redirect(#[from] RedirectError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors returned by the integrations backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// Non-success response. `message` is the backend's own error text and is
    /// what failure classification looks at.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Installation required for {provider}")]
    InstallationRequired {
        provider: ProviderId,
        install_url: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("{provider} has no {operation} endpoint")]
    Unsupported {
        provider: ProviderId,
        operation: &'static str,
    },
}

/// Failures of the design-file URL import sub-flow.
///
/// These are the only flow errors handed back to the caller; everything else
/// stays inside the flow state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("Not a valid design file link: {0}")]
    InvalidUrl(String),

    #[error("Could not load design file preview: {0}")]
    PreviewFailed(String),

    #[error("Design account is not connected")]
    NotConnected,

    #[error("Import was cancelled")]
    Cancelled,
}

/// Persistent storage errors for the redirect marker.
#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
