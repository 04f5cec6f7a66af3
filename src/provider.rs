//! Provider identities and the per-provider behavior table.

use serde::{Deserialize, Serialize};

/// The four content providers a user can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    SourceHostA,
    SourceHostB,
    DesignHost,
    VideoHost,
}

impl ProviderId {
    /// Every provider, in display order.
    pub const ALL: [ProviderId; 4] = [
        Self::SourceHostA,
        Self::SourceHostB,
        Self::DesignHost,
        Self::VideoHost,
    ];

    /// Wire identifier, as used in URLs, query parameters and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceHostA => "source_host_a",
            Self::SourceHostB => "source_host_b",
            Self::DesignHost => "design_host",
            Self::VideoHost => "video_host",
        }
    }

    /// Static behavior for this provider.
    pub fn behavior(&self) -> &'static ProviderBehavior {
        match self {
            Self::SourceHostA => &SOURCE_HOST_A,
            Self::SourceHostB => &SOURCE_HOST_B,
            Self::DesignHost => &DESIGN_HOST,
            Self::VideoHost => &VIDEO_HOST,
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        self.behavior().display_name
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown provider: {s}"))
    }
}

/// What a provider's listing step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// A list of resources fetched from the backend.
    Listing,
    /// No listing: the user pastes a link, previewed one at a time.
    PastedUrl,
}

/// Per-provider parameters for the generic flow state machine.
#[derive(Debug)]
pub struct ProviderBehavior {
    pub display_name: &'static str,
    /// Noun used for this provider's resources in prompts ("repository").
    pub resource_noun: &'static str,
    pub resource_plural: &'static str,
    pub listing: ListingKind,
    /// Whether listing can be gated behind a second, install-style grant.
    pub supports_install: bool,
}

static SOURCE_HOST_A: ProviderBehavior = ProviderBehavior {
    display_name: "Source Host A",
    resource_noun: "repository",
    resource_plural: "repositories",
    listing: ListingKind::Listing,
    supports_install: true,
};

static SOURCE_HOST_B: ProviderBehavior = ProviderBehavior {
    display_name: "Source Host B",
    resource_noun: "project",
    resource_plural: "projects",
    listing: ListingKind::Listing,
    supports_install: false,
};

static DESIGN_HOST: ProviderBehavior = ProviderBehavior {
    display_name: "Design Host",
    resource_noun: "design file",
    resource_plural: "design files",
    listing: ListingKind::PastedUrl,
    supports_install: false,
};

static VIDEO_HOST: ProviderBehavior = ProviderBehavior {
    display_name: "Video Host",
    resource_noun: "video",
    resource_plural: "videos",
    listing: ListingKind::Listing,
    supports_install: false,
};

impl ProviderBehavior {
    pub fn connect_message(&self) -> String {
        format!("You need to connect your {} account first.", self.display_name)
    }

    pub fn loading_message(&self) -> String {
        format!("Checking your {} connection...", self.display_name)
    }

    pub fn install_message(&self) -> String {
        format!(
            "Install the {} app on the accounts you want to import from.",
            self.display_name
        )
    }

    pub fn select_message(&self) -> String {
        match self.listing {
            ListingKind::Listing => format!("Select a {} to import.", self.resource_noun),
            ListingKind::PastedUrl => {
                format!("Paste a link to a {} {}.", self.display_name, self.resource_noun)
            }
        }
    }

    pub fn expired_message(&self) -> String {
        format!(
            "Your {} session has expired. Please reconnect your account.",
            self.display_name
        )
    }
}
