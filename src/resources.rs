//! Importable resources and the mapping from backend records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::backend::{IntegrationBackend, Listing};
use crate::design_url::{DesignKind, DesignTarget};
use crate::error::BackendError;
use crate::provider::ProviderId;

/// A source repository on Source Host A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub stars: u32,
    pub language: Option<String>,
    pub private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

/// A project on Source Host B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: String,
    pub url: String,
    pub description: Option<String>,
    pub stars: u32,
    pub visibility: Visibility,
    pub avatar_url: Option<String>,
}

impl Project {
    pub fn is_private(&self) -> bool {
        self.visibility != Visibility::Public
    }
}

/// A design file, described by its preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignFile {
    pub key: String,
    pub name: String,
    pub page_count: Option<u32>,
    pub kind: DesignKind,
    pub url: String,
}

/// A recording on the video host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub url: String,
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
}

/// Any importable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    Repository(Repository),
    Project(Project),
    DesignFile(DesignFile),
    Video(Video),
}

impl Resource {
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Repository(_) => ProviderId::SourceHostA,
            Self::Project(_) => ProviderId::SourceHostB,
            Self::DesignFile(_) => ProviderId::DesignHost,
            Self::Video(_) => ProviderId::VideoHost,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Repository(r) => &r.name,
            Self::Project(p) => &p.name,
            Self::DesignFile(d) => &d.name,
            Self::Video(v) => &v.title,
        }
    }

    /// Canonical link embedded in the handoff message.
    pub fn url(&self) -> &str {
        match self {
            Self::Repository(r) => &r.url,
            Self::Project(p) => &p.url,
            Self::DesignFile(d) => &d.url,
            Self::Video(v) => &v.url,
        }
    }

    /// Case-insensitive match on the name (and full path where there is one).
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let secondary = match self {
            Self::Repository(r) => Some(r.full_name.as_str()),
            Self::Project(p) => Some(p.path.as_str()),
            _ => None,
        };
        self.name().to_lowercase().contains(&query)
            || secondary.is_some_and(|s| s.to_lowercase().contains(&query))
    }
}

// ── Backend record shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RepositoryRecord {
    name: String,
    #[serde(default)]
    full_name: Option<String>,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    private: bool,
}

impl From<RepositoryRecord> for Resource {
    fn from(r: RepositoryRecord) -> Self {
        Resource::Repository(Repository {
            full_name: r.full_name.unwrap_or_else(|| r.name.clone()),
            name: r.name,
            url: r.html_url,
            description: r.description,
            stars: r.stargazers_count,
            language: r.language,
            private: r.private,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProjectRecord {
    name: String,
    #[serde(default)]
    path_with_namespace: Option<String>,
    web_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    star_count: u32,
    visibility: Visibility,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<ProjectRecord> for Resource {
    fn from(p: ProjectRecord) -> Self {
        Resource::Project(Project {
            path: p.path_with_namespace.unwrap_or_else(|| p.name.clone()),
            name: p.name,
            url: p.web_url,
            description: p.description,
            stars: p.star_count,
            visibility: p.visibility,
            avatar_url: p.avatar_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct VideoRecord {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    duration_seconds: Option<u64>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

impl From<VideoRecord> for Resource {
    fn from(v: VideoRecord) -> Self {
        Resource::Video(Video {
            id: v.id,
            title: v.title,
            url: v.url,
            duration_secs: v.duration_seconds,
            thumbnail_url: v.thumbnail_url,
        })
    }
}

type MapFn = fn(ProviderId, Vec<serde_json::Value>) -> Result<Vec<Resource>, BackendError>;

fn map_records<R>(
    provider: ProviderId,
    items: Vec<serde_json::Value>,
) -> Result<Vec<Resource>, BackendError>
where
    R: DeserializeOwned + Into<Resource>,
{
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<R>(item)
                .map(Into::into)
                .map_err(|e| BackendError::Decode {
                    endpoint: format!("{provider}/resources"),
                    reason: e.to_string(),
                })
        })
        .collect()
}

// ── Fetcher ─────────────────────────────────────────────────────────

/// Result of listing a provider's resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Resources(Vec<Resource>),
    InstallationRequired { install_url: String },
}

/// Maps backend listing and preview responses onto [`Resource`].
///
/// No retries, no pagination, no caching.
pub struct ResourceFetcher {
    backend: Arc<dyn IntegrationBackend>,
}

impl ResourceFetcher {
    pub fn new(backend: Arc<dyn IntegrationBackend>) -> Self {
        Self { backend }
    }

    /// List resources for a listing provider.
    pub async fn list(&self, provider: ProviderId) -> Result<FetchOutcome, BackendError> {
        let map: MapFn = match provider {
            ProviderId::SourceHostA => map_records::<RepositoryRecord>,
            ProviderId::SourceHostB => map_records::<ProjectRecord>,
            ProviderId::VideoHost => map_records::<VideoRecord>,
            ProviderId::DesignHost => {
                return Err(BackendError::Unsupported {
                    provider,
                    operation: "listing",
                });
            }
        };

        let resources = match self.backend.list_resources(provider).await? {
            Listing::Items(items) => map(provider, items)?,
            Listing::InstallationRequired { install_url } => {
                return Ok(FetchOutcome::InstallationRequired { install_url });
            }
        };
        tracing::debug!(provider = %provider, count = resources.len(), "Fetched resources");
        Ok(FetchOutcome::Resources(resources))
    }

    /// Fetch the preview for one pasted design link.
    pub async fn preview(
        &self,
        provider: ProviderId,
        target: &DesignTarget,
    ) -> Result<DesignFile, BackendError> {
        if provider != ProviderId::DesignHost {
            return Err(BackendError::Unsupported {
                provider,
                operation: "preview",
            });
        }
        let preview = self.backend.design_preview(&target.key, target.kind).await?;
        Ok(DesignFile {
            key: target.key.clone(),
            name: preview.name,
            page_count: preview.page_count,
            kind: target.kind,
            url: target.url.clone(),
        })
    }
}
