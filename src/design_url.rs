//! Validation and classification of pasted design-file links.

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// Kinds of design-host resources a link can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignKind {
    Design,
    Prototype,
    Board,
    Slides,
    Site,
}

impl DesignKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Design => "design",
            Self::Prototype => "prototype",
            Self::Board => "board",
            Self::Slides => "slides",
            Self::Site => "site",
        }
    }

    /// Slides and published sites cannot be read through the metadata API;
    /// they are handed off as bare links.
    pub fn skips_preview(&self) -> bool {
        matches!(self, Self::Slides | Self::Site)
    }

    /// Noun used in the handoff message.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Design => "design file",
            Self::Prototype => "prototype",
            Self::Board => "board",
            Self::Slides => "slide deck",
            Self::Site => "published site",
        }
    }

    fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "file" | "design" => Some(Self::Design),
            "proto" => Some(Self::Prototype),
            "board" => Some(Self::Board),
            "slides" | "deck" => Some(Self::Slides),
            "site" => Some(Self::Site),
            _ => None,
        }
    }
}

impl std::fmt::Display for DesignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated design link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignTarget {
    /// The link as the user pasted it, trimmed.
    pub url: String,
    /// File key for path-based links; the host for published sites.
    pub key: String,
    pub kind: DesignKind,
}

/// Parses links against the configured design domains.
#[derive(Debug, Clone)]
pub struct DesignUrlParser {
    design_domain: String,
    sites_domain: String,
    path_pattern: Regex,
}

impl DesignUrlParser {
    pub fn new(design_domain: impl Into<String>, sites_domain: impl Into<String>) -> Self {
        let path_pattern =
            Regex::new(r"^/(file|design|proto|board|slides|deck|site)/([A-Za-z0-9]+)(?:/|$)")
                .unwrap();
        Self {
            design_domain: design_domain.into().to_ascii_lowercase(),
            sites_domain: sites_domain.into().to_ascii_lowercase(),
            path_pattern,
        }
    }

    /// Validate `input` and classify the resource it points at.
    pub fn parse(&self, input: &str) -> Result<DesignTarget, ImportError> {
        let trimmed = input.trim();
        let invalid = || ImportError::InvalidUrl(trimmed.to_string());

        let url = Url::parse(trimmed).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();

        if domain_matches(&host, &self.sites_domain) {
            return Ok(DesignTarget {
                url: trimmed.to_string(),
                key: host,
                kind: DesignKind::Site,
            });
        }

        if !domain_matches(&host, &self.design_domain) {
            return Err(invalid());
        }

        let captures = self.path_pattern.captures(url.path()).ok_or_else(invalid)?;
        let kind = DesignKind::from_path_segment(&captures[1]).ok_or_else(invalid)?;

        Ok(DesignTarget {
            url: trimmed.to_string(),
            key: captures[2].to_string(),
            kind,
        })
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DesignUrlParser {
        DesignUrlParser::new("design-host.com", "design-host.site")
    }

    #[test]
    fn file_links_are_design_kind() {
        let target = parser()
            .parse("https://www.design-host.com/file/AbC123/Landing-Page?node-id=1")
            .unwrap();
        assert_eq!(target.kind, DesignKind::Design);
        assert_eq!(target.key, "AbC123");
        assert!(!target.kind.skips_preview());
    }

    #[test]
    fn path_segments_map_to_kinds() {
        let cases = [
            ("https://design-host.com/design/K1", DesignKind::Design),
            ("https://design-host.com/proto/K2/flow", DesignKind::Prototype),
            ("https://design-host.com/board/K3", DesignKind::Board),
            ("https://design-host.com/slides/K4", DesignKind::Slides),
            ("https://design-host.com/deck/K5", DesignKind::Slides),
            ("https://design-host.com/site/K6", DesignKind::Site),
        ];
        for (url, kind) in cases {
            assert_eq!(parser().parse(url).unwrap().kind, kind, "{url}");
        }
    }

    #[test]
    fn published_site_host_is_site_kind() {
        let target = parser().parse("https://brand.design-host.site").unwrap();
        assert_eq!(target.kind, DesignKind::Site);
        assert_eq!(target.url, "https://brand.design-host.site");
        assert!(target.kind.skips_preview());
    }

    #[test]
    fn malformed_and_foreign_links_are_rejected() {
        for input in [
            "not a url",
            "",
            "ftp://design-host.com/file/K1",
            "https://evil-design-host.com/file/K1",
            "https://design-host.com/files/K1",
            "https://design-host.com/",
            "https://other.example/file/K1",
        ] {
            assert!(
                matches!(parser().parse(input), Err(ImportError::InvalidUrl(_))),
                "{input} should be rejected"
            );
        }
    }
}
