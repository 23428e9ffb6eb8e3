//! Manifest and manifest-list parsing.
//!
//! Both OCI (`application/vnd.oci.image.*`) and Docker schema 2
//! (`application/vnd.docker.distribution.*`) documents deserialize into the
//! `oci-spec` types, which are then flattened into the core descriptor model.

use a3s_stow_core::error::ExportError;
use a3s_stow_core::image::{BlobDescriptor, ImageTarget, ManifestEntry};
use a3s_stow_core::platform::Platform;
use oci_spec::image::{Descriptor, ImageIndex, ImageManifest};
use serde::Deserialize;

/// Config and ordered layer chain of one platform manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLayers {
    pub config: BlobDescriptor,
    pub layers: Vec<BlobDescriptor>,
}

/// The platform fields of an image configuration blob.
#[derive(Debug, Deserialize)]
struct ConfigPlatform {
    os: Option<String>,
    architecture: Option<String>,
    variant: Option<String>,
}

/// Interpret the blob an image name points at.
///
/// The descriptor's media type decides; documents stored with an
/// unrecognised media type are classified by their shape.
pub fn parse_target(descriptor: &BlobDescriptor, bytes: &[u8]) -> Result<ImageTarget, ExportError> {
    let is_index = descriptor.is_index() || looks_like_index(bytes);
    if !is_index {
        return Ok(ImageTarget::Manifest(descriptor.clone()));
    }

    let index: ImageIndex = serde_json::from_slice(bytes)
        .map_err(|e| invalid(&descriptor.digest, e.to_string()))?;

    let entries = index
        .manifests()
        .iter()
        .map(|d| {
            Ok(ManifestEntry {
                descriptor: to_blob_descriptor(d)?,
                platform: d.platform().as_ref().map(|p| {
                    Platform::new(
                        &p.os().to_string(),
                        &p.architecture().to_string(),
                        p.variant().as_deref(),
                    )
                }),
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    Ok(ImageTarget::Index {
        descriptor: descriptor.clone(),
        entries,
    })
}

/// Parse a single-platform manifest into its config and layers.
pub fn parse_manifest(digest: &str, bytes: &[u8]) -> Result<ManifestLayers, ExportError> {
    let manifest: ImageManifest =
        serde_json::from_slice(bytes).map_err(|e| invalid(digest, e.to_string()))?;

    Ok(ManifestLayers {
        config: to_blob_descriptor(manifest.config())?,
        layers: manifest
            .layers()
            .iter()
            .map(to_blob_descriptor)
            .collect::<Result<_, _>>()?,
    })
}

/// Platform recorded in an image configuration, if it names one.
pub fn config_platform(bytes: &[u8]) -> Option<Platform> {
    let config: ConfigPlatform = serde_json::from_slice(bytes).ok()?;
    match (config.os, config.architecture) {
        (Some(os), Some(arch)) if !os.is_empty() && !arch.is_empty() => {
            Some(Platform::new(&os, &arch, config.variant.as_deref()))
        }
        _ => None,
    }
}

fn to_blob_descriptor(d: &Descriptor) -> Result<BlobDescriptor, ExportError> {
    let digest = d.digest().to_string();
    let size = u64::try_from(d.size().to_owned())
        .map_err(|_| invalid(&digest, "negative blob size".to_string()))?;
    Ok(BlobDescriptor::new(d.media_type().to_string(), digest, size))
}

fn looks_like_index(bytes: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .map(|v| v.get("manifests").is_some_and(|m| m.is_array()))
        .unwrap_or(false)
}

fn invalid(digest: &str, reason: String) -> ExportError {
    ExportError::InvalidManifest {
        digest: digest.to_string(),
        reason,
    }
}
