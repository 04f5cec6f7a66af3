//! Redirect markers: resuming a flow after an external authorization page.
//!
//! Two completion mechanisms exist. Some providers have the backend redirect
//! back with `?connected=<provider>` on the page URL; for others a marker is
//! written to persistent storage right before navigating away. Both are
//! consumed here, at most once per orchestrator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RedirectError;
use crate::provider::ProviderId;

/// Storage key holding the pending redirect marker.
pub const REDIRECT_MARKER_KEY: &str = "integration_redirect_marker";

/// Query parameter set by the backend's post-authorization redirect.
pub const CONNECTED_QUERY_PARAM: &str = "connected";

/// Key-value storage that survives a full page load.
pub trait PersistentKeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, RedirectError>;
    fn set(&self, key: &str, value: &str) -> Result<(), RedirectError>;
    fn remove(&self, key: &str) -> Result<(), RedirectError>;
}

/// Query parameters of the current page.
pub trait QueryParamSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    /// Strip `name` from the current URL.
    fn remove(&self, name: &str);
}

/// Marker written before navigating to an authorization page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectMarker {
    pub provider: ProviderId,
    pub created_at: DateTime<Utc>,
}

impl RedirectMarker {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(self.created_at) > ttl
    }
}

/// Which mechanism signalled the return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectSource {
    StoredMarker,
    QueryParam,
}

/// A flow to resume after returning from an authorization page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRedirect {
    pub provider: ProviderId,
    pub source: RedirectSource,
}

/// Reads and writes redirect markers through injected browser-like state.
pub struct RedirectMarkerStore {
    storage: Arc<dyn PersistentKeyValueStore>,
    query: Arc<dyn QueryParamSource>,
    ttl: Duration,
    consumed: AtomicBool,
}

impl RedirectMarkerStore {
    pub fn new(
        storage: Arc<dyn PersistentKeyValueStore>,
        query: Arc<dyn QueryParamSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            query,
            ttl,
            consumed: AtomicBool::new(false),
        }
    }

    /// Record that `provider`'s authorization page is about to be opened.
    pub fn write_marker(&self, provider: ProviderId) -> Result<(), RedirectError> {
        self.write_marker_at(provider, Utc::now())
    }

    pub fn write_marker_at(
        &self,
        provider: ProviderId,
        now: DateTime<Utc>,
    ) -> Result<(), RedirectError> {
        let marker = RedirectMarker {
            provider,
            created_at: now,
        };
        self.storage
            .set(REDIRECT_MARKER_KEY, &serde_json::to_string(&marker)?)?;
        debug!(provider = %provider, "Redirect marker written");
        Ok(())
    }

    /// Consume any pending redirect. Only the first call per store does work.
    pub fn consume_pending_redirect(&self) -> Option<PendingRedirect> {
        self.consume_pending_redirect_at(Utc::now())
    }

    pub fn consume_pending_redirect_at(&self, now: DateTime<Utc>) -> Option<PendingRedirect> {
        if self.consumed.swap(true, Ordering::SeqCst) {
            return None;
        }

        // Both sources are always cleared; the backend's query parameter wins
        // when both are present.
        let from_marker = self.take_stored_marker(now);
        let from_query = self.take_query_param();

        match (from_query, from_marker) {
            (Some(q), Some(m)) if q.provider != m.provider => {
                warn!(
                    query = %q.provider,
                    marker = %m.provider,
                    "Redirect marker and query parameter disagree; using query parameter"
                );
                Some(q)
            }
            (Some(q), _) => Some(q),
            (None, m) => m,
        }
    }

    fn take_stored_marker(&self, now: DateTime<Utc>) -> Option<PendingRedirect> {
        let raw = match self.storage.get(REDIRECT_MARKER_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read redirect marker");
                return None;
            }
        };

        if let Err(e) = self.storage.remove(REDIRECT_MARKER_KEY) {
            warn!(error = %e, "Failed to delete redirect marker");
        }

        let marker: RedirectMarker = match serde_json::from_str(&raw) {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable redirect marker");
                return None;
            }
        };

        if marker.is_expired(now, self.ttl) {
            debug!(provider = %marker.provider, "Discarding expired redirect marker");
            return None;
        }

        info!(provider = %marker.provider, "Resuming flow from redirect marker");
        Some(PendingRedirect {
            provider: marker.provider,
            source: RedirectSource::StoredMarker,
        })
    }

    fn take_query_param(&self) -> Option<PendingRedirect> {
        let value = self.query.get(CONNECTED_QUERY_PARAM)?;
        self.query.remove(CONNECTED_QUERY_PARAM);

        match value.parse::<ProviderId>() {
            Ok(provider) => {
                info!(provider = %provider, "Resuming flow from connected query parameter");
                Some(PendingRedirect {
                    provider,
                    source: RedirectSource::QueryParam,
                })
            }
            Err(e) => {
                warn!(error = %e, "Ignoring connected query parameter");
                None
            }
        }
    }
}

// ── Storage implementations ─────────────────────────────────────────

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentKeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, RedirectError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RedirectError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), RedirectError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Key-value store persisted as a JSON object in a single file.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, RedirectError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), RedirectError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl PersistentKeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, RedirectError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RedirectError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), RedirectError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ── Query parameter source ──────────────────────────────────────────

/// The current page URL, whose query parameters can be stripped in place.
#[derive(Debug)]
pub struct PageUrl {
    url: Mutex<Option<Url>>,
}

impl PageUrl {
    /// Wrap `raw`; an unparsable URL behaves as one without parameters.
    pub fn new(raw: &str) -> Self {
        Self {
            url: Mutex::new(Url::parse(raw).ok()),
        }
    }

    /// A page with no URL at all.
    pub fn empty() -> Self {
        Self {
            url: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<String> {
        let url = self.url.lock().unwrap_or_else(|e| e.into_inner());
        url.as_ref().map(|u| u.to_string())
    }
}

impl QueryParamSource for PageUrl {
    fn get(&self, name: &str) -> Option<String> {
        let url = self.url.lock().unwrap_or_else(|e| e.into_inner());
        url.as_ref()?
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn remove(&self, name: &str) {
        let mut guard = self.url.lock().unwrap_or_else(|e| e.into_inner());
        let Some(url) = guard.as_mut() else {
            return;
        };
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
}
