//! Classification of listing and preview failures.
//!
//! The backend reports most failures as free text, so session expiry is
//! recognised by substring. Keep the heuristic here and nowhere else; it
//! should be replaced once the backend returns structured error codes.

use crate::error::BackendError;

/// Substrings that mark a backend message as an expired or missing session.
const SESSION_EXPIRED_MARKERS: [&str; 3] = ["connect", "expired", "token"];

/// How a failed provider call should move the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// A second grant is required; continue at `install_url`.
    NeedsInstall { install_url: String },
    /// The account must be connected again.
    SessionExpired,
    /// Anything else: show a generic retryable error.
    Generic,
}

/// Classify a free-text failure message.
pub fn classify_failure(message: &str) -> FailureKind {
    if SESSION_EXPIRED_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        FailureKind::SessionExpired
    } else {
        FailureKind::Generic
    }
}

/// Classify a backend error.
///
/// Transport and decode failures are never read as session expiry, since
/// their text comes from the HTTP stack ("error trying to connect").
pub fn classify_error(err: &BackendError) -> FailureKind {
    match err {
        BackendError::InstallationRequired { install_url, .. } => FailureKind::NeedsInstall {
            install_url: install_url.clone(),
        },
        BackendError::Status { message, .. } => classify_failure(message),
        BackendError::Transport { .. }
        | BackendError::Decode { .. }
        | BackendError::Unsupported { .. } => FailureKind::Generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn expiry_markers_match() {
        assert_eq!(classify_failure("Please connect your account"), FailureKind::SessionExpired);
        assert_eq!(classify_failure("Session expired"), FailureKind::SessionExpired);
        assert_eq!(classify_failure("invalid token"), FailureKind::SessionExpired);
    }

    #[test]
    fn other_messages_are_generic() {
        assert_eq!(classify_failure("Internal server error"), FailureKind::Generic);
        assert_eq!(classify_failure(""), FailureKind::Generic);
    }

    #[test]
    fn installation_error_carries_url() {
        let err = BackendError::InstallationRequired {
            provider: ProviderId::SourceHostA,
            install_url: "https://source-a.example/apps/install".into(),
        };
        assert_eq!(
            classify_error(&err),
            FailureKind::NeedsInstall {
                install_url: "https://source-a.example/apps/install".into()
            }
        );
    }

    #[test]
    fn transport_text_is_not_read_as_expiry() {
        let err = BackendError::Transport {
            endpoint: "/api/integrations/source_host_a/resources".into(),
            reason: "error trying to connect: connection refused".into(),
        };
        assert_eq!(classify_error(&err), FailureKind::Generic);
    }

    #[test]
    fn status_message_is_classified() {
        let err = BackendError::Status {
            status: 401,
            message: "Source Host A token expired".into(),
        };
        assert_eq!(classify_error(&err), FailureKind::SessionExpired);
    }
}
