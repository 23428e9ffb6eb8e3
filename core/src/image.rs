//! Content descriptors and manifest-list entries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowError};
use crate::platform::Platform;

pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_DOCKER_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str =
    "application/vnd.docker.distribution.manifest.v2+json";

/// Reference to an immutable blob: media type, digest and length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

impl BlobDescriptor {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
        }
    }

    pub fn is_index(&self) -> bool {
        self.media_type == MEDIA_TYPE_OCI_INDEX || self.media_type == MEDIA_TYPE_DOCKER_LIST
    }

    /// Path of this blob inside an OCI layout (`blobs/sha256/<hex>`).
    pub fn blob_path(&self) -> Result<String> {
        Ok(format!("blobs/sha256/{}", digest_hex(&self.digest)?))
    }
}

/// One per-platform manifest listed by an image index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub descriptor: BlobDescriptor,
    /// `None` when the index entry carries no platform (attestations and
    /// other non-runnable artifacts).
    pub platform: Option<Platform>,
}

/// What an image name points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    /// A single-platform manifest.
    Manifest(BlobDescriptor),
    /// A manifest list / OCI index and its entries, in index order.
    Index {
        descriptor: BlobDescriptor,
        entries: Vec<ManifestEntry>,
    },
}

impl ImageTarget {
    pub fn descriptor(&self) -> &BlobDescriptor {
        match self {
            ImageTarget::Manifest(d) => d,
            ImageTarget::Index { descriptor, .. } => descriptor,
        }
    }
}

/// An image reference resolved against the image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Canonical stored name (e.g. `docker.io/library/nginx:latest`).
    pub name: String,
    pub target: ImageTarget,
}

/// Validate a `sha256:<hex>` digest and return the hex part.
pub fn digest_hex(digest: &str) -> Result<&str> {
    let hex = digest
        .strip_prefix("sha256:")
        .ok_or_else(|| StowError::InvalidDigest(digest.to_string()))?;
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(StowError::InvalidDigest(digest.to_string()));
    }
    Ok(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_digest_hex() {
        assert_eq!(digest_hex(DIGEST).unwrap().len(), 64);
    }

    #[test]
    fn test_digest_hex_rejects_other_algorithms() {
        assert!(digest_hex("sha512:abcd").is_err());
        assert!(digest_hex("2cf24dba").is_err());
    }

    #[test]
    fn test_digest_hex_rejects_path_tricks() {
        assert!(digest_hex("sha256:../../../../etc/passwd").is_err());
        let upper = DIGEST.to_uppercase().replace("SHA256", "sha256");
        assert!(digest_hex(&upper).is_err());
    }

    #[test]
    fn test_blob_path() {
        let desc = BlobDescriptor::new(MEDIA_TYPE_OCI_CONFIG, DIGEST, 5);
        assert_eq!(
            desc.blob_path().unwrap(),
            format!("blobs/sha256/{}", &DIGEST[7..])
        );
    }

    #[test]
    fn test_is_index() {
        assert!(BlobDescriptor::new(MEDIA_TYPE_OCI_INDEX, DIGEST, 1).is_index());
        assert!(BlobDescriptor::new(MEDIA_TYPE_DOCKER_LIST, DIGEST, 1).is_index());
        assert!(!BlobDescriptor::new(MEDIA_TYPE_OCI_MANIFEST, DIGEST, 1).is_index());
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let desc = BlobDescriptor::new(MEDIA_TYPE_OCI_CONFIG, DIGEST, 5);
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["mediaType"], MEDIA_TYPE_OCI_CONFIG);
        assert_eq!(json["size"], 5);
    }
}
