//! Natural-language descriptions handed to the conversation.

use crate::design_url::DesignTarget;
use crate::provider::ProviderId;
use crate::resources::{Resource, Visibility};

/// Describe a selected resource for the assistant.
pub fn describe_resource(resource: &Resource) -> String {
    let provider = resource.provider().display_name();
    let mut details = Vec::new();

    let (noun, label) = match resource {
        Resource::Repository(repo) => {
            if let Some(ref language) = repo.language {
                details.push(language.clone());
            }
            details.push(stars(repo.stars));
            if repo.private {
                details.push("private".to_string());
            }
            ("repository", repo.full_name.as_str())
        }
        Resource::Project(project) => {
            details.push(
                match project.visibility {
                    Visibility::Public => "public",
                    Visibility::Internal => "internal",
                    Visibility::Private => "private",
                }
                .to_string(),
            );
            details.push(stars(project.stars));
            ("project", project.path.as_str())
        }
        Resource::DesignFile(file) => {
            if let Some(pages) = file.page_count {
                details.push(if pages == 1 {
                    "1 page".to_string()
                } else {
                    format!("{pages} pages")
                });
            }
            (file.kind.label(), file.name.as_str())
        }
        Resource::Video(video) => {
            if let Some(secs) = video.duration_secs {
                details.push(duration(secs));
            }
            ("video", video.title.as_str())
        }
    };

    let verb = match resource {
        Resource::Video(_) => "Please use my",
        _ => "Please import my",
    };

    if details.is_empty() {
        format!("{verb} {provider} {noun} \"{label}\": {}", resource.url())
    } else {
        format!(
            "{verb} {provider} {noun} \"{label}\" ({}): {}",
            details.join(", "),
            resource.url()
        )
    }
}

/// Describe a pasted design link that is handed off without a preview.
pub fn describe_design_link(target: &DesignTarget) -> String {
    format!(
        "Please import this {} {}: {}",
        ProviderId::DesignHost.display_name(),
        target.kind.label(),
        target.url
    )
}

/// `m:ss`, or `h:mm:ss` from one hour up.
fn duration(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

fn stars(count: u32) -> String {
    if count == 1 {
        "1 star".to_string()
    } else {
        format!("{count} stars")
    }
}
