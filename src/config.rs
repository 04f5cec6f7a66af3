//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// How long a redirect marker stays valid (5 minutes).
pub const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(300);

/// Integration flow configuration.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Base URL of the integrations backend.
    pub api_url: String,
    /// Bearer token for the backend, if it requires one.
    pub api_token: Option<SecretString>,
    /// Redirect markers older than this are discarded.
    pub marker_ttl: Duration,
    /// Host serving design files (`design-host.com`).
    pub design_domain: String,
    /// Domain under which published design sites live (`design-host.site`).
    pub design_sites_domain: String,
    /// File backing the persistent key-value store in the CLI.
    pub state_file: PathBuf,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            api_token: None,
            marker_ttl: DEFAULT_MARKER_TTL,
            design_domain: "design-host.com".to_string(),
            design_sites_domain: "design-host.site".to_string(),
            state_file: PathBuf::from("./data/integrations.json"),
        }
    }
}

impl IntegrationConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("INTEGRATIONS_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("INTEGRATIONS_API_URL".to_string()))?;

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "INTEGRATIONS_API_URL".to_string(),
                message: format!("expected an http(s) URL, got {api_url}"),
            });
        }

        let api_token = lookup("INTEGRATIONS_API_TOKEN")
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let marker_ttl = match lookup("INTEGRATIONS_MARKER_TTL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "INTEGRATIONS_MARKER_TTL_SECS".to_string(),
                    message: format!("not a number of seconds: {raw}"),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.marker_ttl,
        };

        let design_domain =
            lookup("INTEGRATIONS_DESIGN_DOMAIN").unwrap_or(defaults.design_domain);
        let design_sites_domain =
            lookup("INTEGRATIONS_DESIGN_SITES_DOMAIN").unwrap_or(defaults.design_sites_domain);
        let state_file = lookup("INTEGRATIONS_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        Ok(Self {
            api_url,
            api_token,
            marker_ttl,
            design_domain,
            design_sites_domain,
            state_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_url_is_an_error() {
        let err = IntegrationConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "INTEGRATIONS_API_URL"));
    }

    #[test]
    fn defaults_apply_when_only_url_set() {
        let config = IntegrationConfig::from_lookup(lookup_from(&[(
            "INTEGRATIONS_API_URL",
            "https://api.example.com/",
        )]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert!(config.api_token.is_none());
        assert_eq!(config.marker_ttl, DEFAULT_MARKER_TTL);
        assert_eq!(config.design_domain, "design-host.com");
        assert_eq!(config.design_sites_domain, "design-host.site");
    }

    #[test]
    fn overrides_are_read() {
        let config = IntegrationConfig::from_lookup(lookup_from(&[
            ("INTEGRATIONS_API_URL", "http://127.0.0.1:9000"),
            ("INTEGRATIONS_API_TOKEN", "secret"),
            ("INTEGRATIONS_MARKER_TTL_SECS", "60"),
            ("INTEGRATIONS_STATE_FILE", "/tmp/state.json"),
        ]))
        .unwrap();
        assert_eq!(config.api_token.unwrap().expose_secret(), "secret");
        assert_eq!(config.marker_ttl, Duration::from_secs(60));
        assert_eq!(config.state_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn bad_ttl_and_bad_url_are_rejected() {
        let err = IntegrationConfig::from_lookup(lookup_from(&[
            ("INTEGRATIONS_API_URL", "http://localhost"),
            ("INTEGRATIONS_MARKER_TTL_SECS", "five"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err =
            IntegrationConfig::from_lookup(lookup_from(&[("INTEGRATIONS_API_URL", "ftp://x")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
