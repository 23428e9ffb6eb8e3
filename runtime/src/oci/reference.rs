//! Image reference normalization.
//!
//! Turns what users type (`nginx`, `ghcr.io/org/app:v1`, `app@sha256:...`)
//! into the canonical names the image store indexes by.

use a3s_stow_core::error::{Result, StowError};

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, possibly with port (e.g. "docker.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g. "library/nginx")
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse and normalize a reference.
    ///
    /// A reference without tag or digest gets the `latest` tag; a name
    /// without a registry component is placed on Docker Hub, and a single
    /// path component there gains the `library/` prefix.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(StowError::InvalidReference(
                "empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(StowError::InvalidReference(format!(
                        "{reference}: digest must be algorithm:hex"
                    )));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        if tag == Some("") {
            return Err(StowError::InvalidReference(format!("{reference}: empty tag")));
        }
        let (registry, repository) = split_registry(name, reference)?;

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag.map(str::to_string),
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// `registry/repository` without tag or digest.
    pub fn repository_name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// `registry/repository:tag`, when the reference carries a tag.
    pub fn tagged_name(&self) -> Option<String> {
        self.tag
            .as_ref()
            .map(|tag| format!("{}:{}", self.repository_name(), tag))
    }

    /// Full canonical reference, including the digest if present.
    pub fn full_reference(&self) -> String {
        let mut s = self.repository_name();
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_reference())
    }
}

/// Split `name[:tag]`, where the tag colon must come after the last `/`
/// so that `host:5000/app` keeps its port.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let last_component = name_tag.rfind('/').map_or(0, |pos| pos + 1);
    match name_tag[last_component..].rfind(':') {
        Some(colon) => {
            let colon = last_component + colon;
            (&name_tag[..colon], Some(&name_tag[colon + 1..]))
        }
        None => (name_tag, None),
    }
}

fn split_registry(name: &str, reference: &str) -> Result<(String, String)> {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(StowError::InvalidReference(format!(
                    "{reference}: empty repository"
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
    }

    if name.is_empty() || name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(StowError::InvalidReference(format!(
            "{reference}: repository name must be lowercase"
        )));
    }

    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{name}")
    };
    Ok((DEFAULT_REGISTRY.to_string(), repository))
}
