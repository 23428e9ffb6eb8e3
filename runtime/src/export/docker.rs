//! Docker `manifest.json` (image spec v1.2) for an archive.
//!
//! The legacy format has one entry per image. An image exported for several
//! platforms is described by its first selected platform; `RepoDigests`
//! lists every selected manifest for reference.

use std::io;

use a3s_stow_core::error::ExportError;
use serde::Serialize;

use super::archive::ExportImage;

#[derive(Debug, Serialize)]
struct DockerManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "RepoTags")]
    repo_tags: Vec<String>,
    #[serde(rename = "RepoDigests", skip_serializing_if = "Vec::is_empty")]
    repo_digests: Vec<String>,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

pub(crate) fn manifest_json(images: &[ExportImage]) -> Result<Vec<u8>, ExportError> {
    let mut entries = Vec::with_capacity(images.len());
    for image in images {
        let Some(first) = image.manifests.first() else {
            continue;
        };

        let repository = familiar_name(image.repository());
        let layers: Vec<String> = first
            .layers
            .iter()
            .map(|layer| path(&layer.digest, layer.blob_path()))
            .collect::<Result<_, _>>()?;

        entries.push(DockerManifestEntry {
            config: path(&first.config.digest, first.config.blob_path())?,
            repo_tags: image
                .tag()
                .map(|tag| vec![format!("{repository}:{tag}")])
                .unwrap_or_default(),
            repo_digests: image
                .manifests
                .iter()
                .map(|m| format!("{repository}@{}", m.descriptor.digest))
                .collect(),
            layers,
        });
    }

    Ok(serde_json::to_vec(&entries).map_err(io::Error::from)?)
}

/// Short form Docker shows for Docker Hub names
/// (`docker.io/library/nginx` → `nginx`).
fn familiar_name(repository: &str) -> &str {
    match repository.strip_prefix("docker.io/") {
        Some(rest) => rest.strip_prefix("library/").unwrap_or(rest),
        None => repository,
    }
}

fn path(
    digest: &str,
    result: a3s_stow_core::error::Result<String>,
) -> Result<String, ExportError> {
    result.map_err(|e| ExportError::InvalidManifest {
        digest: digest.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::archive::SelectedManifest;
    use a3s_stow_core::image::{BlobDescriptor, MEDIA_TYPE_OCI_CONFIG, MEDIA_TYPE_OCI_MANIFEST};
    use a3s_stow_core::platform::Platform;

    fn digest(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    fn manifest(m: char, c: char, layers: &[char], arch: &str) -> SelectedManifest {
        SelectedManifest {
            descriptor: BlobDescriptor::new(MEDIA_TYPE_OCI_MANIFEST, digest(m), 10),
            platform: Some(Platform::new("linux", arch, None)),
            config: BlobDescriptor::new(MEDIA_TYPE_OCI_CONFIG, digest(c), 10),
            layers: layers
                .iter()
                .map(|l| BlobDescriptor::new("layer", digest(*l), 10))
                .collect(),
        }
    }

    fn parse(images: &[ExportImage]) -> Vec<serde_json::Value> {
        serde_json::from_slice(&manifest_json(images).unwrap()).unwrap()
    }

    #[test]
    fn test_one_entry_per_image_using_first_platform() {
        let images = vec![ExportImage {
            name: "docker.io/library/nginx:latest".to_string(),
            manifests: vec![
                manifest('1', '2', &['3', '4'], "amd64"),
                manifest('5', '6', &['7'], "arm64"),
            ],
        }];

        let entries = parse(&images);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["Config"], format!("blobs/sha256/{}", "2".repeat(64)));
        assert_eq!(
            entry["Layers"],
            serde_json::json!([
                format!("blobs/sha256/{}", "3".repeat(64)),
                format!("blobs/sha256/{}", "4".repeat(64)),
            ])
        );
        assert_eq!(entry["RepoTags"], serde_json::json!(["nginx:latest"]));
        assert_eq!(
            entry["RepoDigests"],
            serde_json::json!([
                format!("nginx@{}", digest('1')),
                format!("nginx@{}", digest('5')),
            ])
        );
    }

    #[test]
    fn test_untagged_image_has_no_repo_tags() {
        let images = vec![ExportImage {
            name: format!("ghcr.io/org/app@{}", digest('1')),
            manifests: vec![manifest('1', '2', &[], "amd64")],
        }];
        let entries = parse(&images);
        assert_eq!(entries[0]["RepoTags"], serde_json::json!([]));
        assert_eq!(
            entries[0]["RepoDigests"][0],
            format!("ghcr.io/org/app@{}", digest('1'))
        );
    }

    #[test]
    fn test_familiar_name() {
        assert_eq!(familiar_name("docker.io/library/nginx"), "nginx");
        assert_eq!(familiar_name("docker.io/user/app"), "user/app");
        assert_eq!(familiar_name("localhost:5000/app"), "localhost:5000/app");
    }
}
