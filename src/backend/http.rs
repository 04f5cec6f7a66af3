//! HTTP implementation of the integrations backend.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{DesignPreview, IntegrationBackend, Listing};
use crate::config::IntegrationConfig;
use crate::design_url::DesignKind;
use crate::error::BackendError;
use crate::provider::ProviderId;

/// Error code the backend uses when listing needs an app installation.
const INSTALLATION_REQUIRED_CODE: &str = "installation_required";

#[derive(Debug, Deserialize)]
struct StatusBody {
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct ListingBody {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(default)]
    needs_installation: bool,
    #[serde(default)]
    install_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorizeBody {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    install_url: Option<String>,
}

/// Outcome of a GET before the body is interpreted.
enum Fetched {
    Ok(String),
    Failed { status: u16, body: ErrorBody },
}

/// Integrations backend reached over HTTP.
pub struct HttpBackend {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self::new(config.api_url.clone(), config.api_token.clone())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/integrations/{path}", self.base_url)
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Fetched, BackendError> {
        let endpoint = self.api_url(path);
        let mut request = self.client.get(&endpoint).query(query);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| BackendError::Transport {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BackendError::Transport {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if status.is_success() {
            return Ok(Fetched::Ok(text));
        }

        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), "Backend returned error status");
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
            error: (!text.trim().is_empty()).then(|| text.trim().to_string()),
            ..Default::default()
        });
        Ok(Fetched::Failed {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        match self.fetch(path, query).await? {
            Fetched::Ok(text) => decode(&self.api_url(path), &text),
            Fetched::Failed { status, body } => Err(status_error(status, body)),
        }
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, text: &str) -> Result<T, BackendError> {
    serde_json::from_str(text).map_err(|e| BackendError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn status_error(status: u16, body: ErrorBody) -> BackendError {
    BackendError::Status {
        status,
        message: body
            .error
            .unwrap_or_else(|| format!("Request failed with status {status}")),
    }
}

#[async_trait]
impl IntegrationBackend for HttpBackend {
    async fn connection_status(&self, provider: ProviderId) -> Result<bool, BackendError> {
        let body: StatusBody = self.get_json(&format!("{provider}/status"), &[]).await?;
        Ok(body.connected)
    }

    async fn list_resources(&self, provider: ProviderId) -> Result<Listing, BackendError> {
        let path = format!("{provider}/resources");
        match self.fetch(&path, &[]).await? {
            Fetched::Ok(text) => {
                let body: ListingBody = decode(&self.api_url(&path), &text)?;
                match (body.needs_installation, body.install_url) {
                    (true, Some(install_url)) => Ok(Listing::InstallationRequired { install_url }),
                    (true, None) => Err(BackendError::Decode {
                        endpoint: self.api_url(&path),
                        reason: "installation required without install_url".to_string(),
                    }),
                    (false, _) => Ok(Listing::Items(body.items)),
                }
            }
            Fetched::Failed { status, body } => {
                let install_required = body.code.as_deref() == Some(INSTALLATION_REQUIRED_CODE);
                match (install_required, body.install_url.clone()) {
                    (true, Some(install_url)) => Err(BackendError::InstallationRequired {
                        provider,
                        install_url,
                    }),
                    _ => Err(status_error(status, body)),
                }
            }
        }
    }

    async fn design_preview(
        &self,
        file_key: &str,
        kind: DesignKind,
    ) -> Result<DesignPreview, BackendError> {
        let path = format!("{}/files/{file_key}/preview", ProviderId::DesignHost);
        self.get_json(&path, &[("kind", kind.as_str())]).await
    }

    async fn authorization_url(&self, provider: ProviderId) -> Result<String, BackendError> {
        let body: AuthorizeBody = self.get_json(&format!("{provider}/authorize"), &[]).await?;
        Ok(body.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        let backend = HttpBackend::new("https://api.example.com/", None);
        assert_eq!(
            backend.api_url("video_host/status"),
            "https://api.example.com/api/integrations/video_host/status"
        );
    }

    #[test]
    fn status_error_prefers_backend_text() {
        let err = status_error(
            401,
            ErrorBody {
                error: Some("token expired".into()),
                ..Default::default()
            },
        );
        assert_eq!(err.to_string(), "token expired");

        let err = status_error(502, ErrorBody::default());
        assert_eq!(err.to_string(), "Request failed with status 502");
    }
}
