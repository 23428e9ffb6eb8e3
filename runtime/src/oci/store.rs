//! Disk-based content store with a named image index.
//!
//! Blobs live under `<content_dir>/blobs/sha256/<hex>` and are shared by every
//! namespace. Image names are kept in a per-namespace `images.json` mapping
//! each canonical name to the descriptor of its manifest or manifest list.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use a3s_stow_core::error::{Result, StowError};
use a3s_stow_core::image::{digest_hex, BlobDescriptor};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Shortest digest prefix accepted when looking an image up by ID.
const MIN_DIGEST_PREFIX: usize = 12;

/// A named image in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Canonical image name (e.g. "docker.io/library/nginx:latest")
    pub name: String,
    /// Manifest or manifest list the name points at
    pub target: BlobDescriptor,
    pub created_at: DateTime<Utc>,
}

/// Persistent index stored as JSON on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    images: Vec<ImageRecord>,
}

/// Content-addressed blob store plus image name index.
pub struct ImageStore {
    content_dir: PathBuf,
    index_path: PathBuf,
    /// In-memory index: name → record
    index: RwLock<BTreeMap<String, ImageRecord>>,
}

impl ImageStore {
    /// Open a store, creating the content directory and loading any
    /// existing index.
    pub fn new(content_dir: &Path, index_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(content_dir.join("blobs").join("sha256")).map_err(|e| {
            StowError::Other(format!(
                "failed to create content directory {}: {}",
                content_dir.display(),
                e
            ))
        })?;

        let store = Self {
            content_dir: content_dir.to_path_buf(),
            index_path: index_path.to_path_buf(),
            index: RwLock::new(BTreeMap::new()),
        };
        *store.index.write() = store.load_index()?;
        Ok(store)
    }

    /// Path of a blob on disk.
    pub fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        let hex = digest_hex(digest)?;
        Ok(self.content_dir.join("blobs").join("sha256").join(hex))
    }

    /// Store bytes under their sha256 digest. Writing an existing blob is a no-op.
    pub fn put_blob(&self, media_type: &str, data: &[u8]) -> Result<BlobDescriptor> {
        let digest = format!("sha256:{:x}", Sha256::digest(data));
        let path = self.blob_path(&digest)?;

        if !path.exists() {
            let tmp_path = path.with_extension("tmp");
            let mut file = File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &path)?;
            tracing::debug!(digest = %digest, size = data.len(), "Stored blob");
        }

        Ok(BlobDescriptor::new(media_type, digest, data.len() as u64))
    }

    /// Open a blob for streaming.
    pub fn open_blob(&self, digest: &str) -> Result<File> {
        let path = self.blob_path(digest)?;
        File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StowError::not_found("blob", digest),
            _ => StowError::Io(e),
        })
    }

    /// Read a whole blob into memory (manifests and configs).
    pub fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(digest)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StowError::not_found("blob", digest),
            _ => StowError::Io(e),
        })
    }

    /// Point `name` at `target`, replacing any previous target.
    pub fn tag(&self, name: &str, target: BlobDescriptor) -> Result<ImageRecord> {
        self.blob_path(&target.digest)?;
        let record = ImageRecord {
            name: name.to_string(),
            target,
            created_at: Utc::now(),
        };

        self.index.write().insert(name.to_string(), record.clone());
        self.save_index()?;
        Ok(record)
    }

    pub fn get(&self, name: &str) -> Option<ImageRecord> {
        self.index.read().get(name).cloned()
    }

    /// Find an image by full digest or an unambiguous hex prefix of it.
    pub fn find_by_digest(&self, id: &str) -> Result<Option<ImageRecord>> {
        let hex = id.strip_prefix("sha256:").unwrap_or(id);
        if hex.len() < MIN_DIGEST_PREFIX || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }

        let index = self.index.read();
        let mut matches = index
            .values()
            .filter(|r| r.target.digest.trim_start_matches("sha256:").starts_with(hex));
        let first = matches.next().cloned();
        let ambiguous = first.as_ref().is_some_and(|first| {
            matches.any(|other| other.target.digest != first.target.digest)
        });
        if ambiguous {
            return Err(StowError::InvalidReference(format!(
                "{id}: ambiguous image ID"
            )));
        }
        Ok(first)
    }

    /// All named images, sorted by name.
    pub fn list(&self) -> Vec<ImageRecord> {
        self.index.read().values().cloned().collect()
    }

    fn load_index(&self) -> Result<BTreeMap<String, ImageRecord>> {
        if !self.index_path.exists() {
            return Ok(BTreeMap::new());
        }

        let data = std::fs::read_to_string(&self.index_path).map_err(|e| {
            StowError::Other(format!(
                "failed to read image index {}: {}",
                self.index_path.display(),
                e
            ))
        })?;
        let store_index: StoreIndex = serde_json::from_str(&data)?;

        Ok(store_index
            .images
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect())
    }

    /// Persist the index (atomic write).
    fn save_index(&self) -> Result<()> {
        let store_index = StoreIndex {
            images: self.index.read().values().cloned().collect(),
        };
        let data = serde_json::to_string_pretty(&store_index)?;

        if let Some(parent) = self.index_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.index_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.index_path).map_err(|e| {
            StowError::Other(format!(
                "failed to write image index {}: {}",
                self.index_path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_stow_core::image::MEDIA_TYPE_OCI_MANIFEST;
    use std::io::Read;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, ImageStore) {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(
            &tmp.path().join("content"),
            &tmp.path().join("default").join("images.json"),
        )
        .unwrap();
        (tmp, store)
    }

    #[test]
    fn test_new_creates_blob_directory() {
        let (tmp, _store) = temp_store();
        assert!(tmp.path().join("content/blobs/sha256").is_dir());
    }

    #[test]
    fn test_put_blob_is_content_addressed() {
        let (_tmp, store) = temp_store();
        let desc = store.put_blob("text/plain", b"hello").unwrap();
        assert_eq!(
            desc.digest,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(desc.size, 5);

        let again = store.put_blob("text/plain", b"hello").unwrap();
        assert_eq!(again, desc);

        let mut content = String::new();
        store
            .open_blob(&desc.digest)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_open_missing_blob() {
        let (_tmp, store) = temp_store();
        let missing = format!("sha256:{}", "0".repeat(64));
        let err = store.open_blob(&missing).unwrap_err();
        assert!(matches!(err, StowError::NotFound { kind: "blob", .. }));
    }

    #[test]
    fn test_open_blob_rejects_bad_digest() {
        let (_tmp, store) = temp_store();
        assert!(matches!(
            store.open_blob("sha256:../../etc/passwd"),
            Err(StowError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_tag_and_get() {
        let (_tmp, store) = temp_store();
        let desc = store.put_blob(MEDIA_TYPE_OCI_MANIFEST, b"{}").unwrap();
        store.tag("docker.io/library/nginx:latest", desc.clone()).unwrap();

        let record = store.get("docker.io/library/nginx:latest").unwrap();
        assert_eq!(record.target, desc);
        assert_eq!(store.list().len(), 1);
        assert!(store.get("docker.io/library/redis:latest").is_none());
    }

    #[test]
    fn test_find_by_digest_prefix() {
        let (_tmp, store) = temp_store();
        let desc = store.put_blob(MEDIA_TYPE_OCI_MANIFEST, b"{}").unwrap();
        store.tag("docker.io/library/alpine:3.19", desc.clone()).unwrap();

        let hex = desc.digest.trim_start_matches("sha256:");
        let found = store.find_by_digest(&hex[..12]).unwrap().unwrap();
        assert_eq!(found.name, "docker.io/library/alpine:3.19");
        assert!(store.find_by_digest(&desc.digest).unwrap().is_some());
        assert!(store.find_by_digest(&hex[..6]).unwrap().is_none());
    }

    #[test]
    fn test_find_by_digest_same_target_twice_is_not_ambiguous() {
        let (_tmp, store) = temp_store();
        let desc = store.put_blob(MEDIA_TYPE_OCI_MANIFEST, b"{}").unwrap();
        store.tag("docker.io/library/a:1", desc.clone()).unwrap();
        store.tag("docker.io/library/a:2", desc.clone()).unwrap();
        assert!(store.find_by_digest(&desc.digest).unwrap().is_some());
    }

    #[test]
    fn test_index_persistence() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        let index = tmp.path().join("ns").join("images.json");

        {
            let store = ImageStore::new(&content, &index).unwrap();
            let desc = store.put_blob(MEDIA_TYPE_OCI_MANIFEST, b"{}").unwrap();
            store.tag("docker.io/library/nginx:latest", desc).unwrap();
        }

        let store = ImageStore::new(&content, &index).unwrap();
        assert!(store.get("docker.io/library/nginx:latest").is_some());
        assert!(!index.with_extension("json.tmp").exists());
    }
}
