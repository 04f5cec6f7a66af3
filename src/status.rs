//! Connection status checks across providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join3;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::IntegrationBackend;
use crate::error::BackendError;
use crate::provider::ProviderId;

/// Providers whose checks succeed or fail together.
pub const GROUPED_PROVIDERS: [ProviderId; 3] = [
    ProviderId::SourceHostA,
    ProviderId::SourceHostB,
    ProviderId::DesignHost,
];

/// Provider checked on its own; its failure never touches the group.
pub const ISOLATED_PROVIDER: ProviderId = ProviderId::VideoHost;

/// Connection status of every provider. `None` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub statuses: BTreeMap<ProviderId, Option<bool>>,
    pub loading: bool,
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            statuses: ProviderId::ALL.into_iter().map(|p| (p, None)).collect(),
            loading: false,
        }
    }
}

impl ConnectionSnapshot {
    pub fn status(&self, provider: ProviderId) -> Option<bool> {
        self.statuses.get(&provider).copied().flatten()
    }
}

/// Asks the backend whether each provider is authorized.
pub struct ConnectionStatusChecker {
    backend: Arc<dyn IntegrationBackend>,
}

impl ConnectionStatusChecker {
    pub fn new(backend: Arc<dyn IntegrationBackend>) -> Self {
        Self { backend }
    }

    /// Check a single provider.
    pub async fn check(&self, provider: ProviderId) -> Result<bool, BackendError> {
        let connected = self.backend.connection_status(provider).await?;
        debug!(provider = %provider, connected, "Connection status");
        Ok(connected)
    }

    /// Check every provider and build a fresh snapshot.
    ///
    /// The grouped providers are all-or-nothing: one failed check leaves all
    /// three unknown. The isolated provider keeps its `previous` value when
    /// its own check fails. Calls are not de-duplicated.
    pub async fn check_all(&self, previous: &ConnectionSnapshot) -> ConnectionSnapshot {
        let [a, b, c] = GROUPED_PROVIDERS;
        let group = try_join3(self.check(a), self.check(b), self.check(c));
        let isolated = self.check(ISOLATED_PROVIDER);
        let (group, isolated) = tokio::join!(group, isolated);

        let mut statuses = BTreeMap::new();
        match group {
            Ok((sa, sb, sc)) => {
                statuses.insert(a, Some(sa));
                statuses.insert(b, Some(sb));
                statuses.insert(c, Some(sc));
            }
            Err(e) => {
                warn!(error = %e, "Grouped connection check failed; statuses unknown");
                for provider in GROUPED_PROVIDERS {
                    statuses.insert(provider, None);
                }
            }
        }

        let isolated_status = match isolated {
            Ok(connected) => Some(connected),
            Err(e) => {
                warn!(provider = %ISOLATED_PROVIDER, error = %e, "Connection check failed");
                previous.status(ISOLATED_PROVIDER)
            }
        };
        statuses.insert(ISOLATED_PROVIDER, isolated_status);

        ConnectionSnapshot {
            statuses,
            loading: false,
        }
    }
}
