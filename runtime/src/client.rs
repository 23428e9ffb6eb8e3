//! Access to the local runtime's stores.
//!
//! Exports and prunes only talk to the runtime through [`RuntimeClient`];
//! [`LocalRuntime`] is the implementation backed by the on-disk stores under
//! a data root.

use std::io::Read;

use a3s_stow_core::config::{validate_namespace, StoreLayout};
use a3s_stow_core::container::ContainerRecord;
use a3s_stow_core::error::{Result, StowError};
use a3s_stow_core::image::ResolvedImage;

use crate::container::ContainerStore;
use crate::oci::manifest::parse_target;
use crate::oci::{ImageRecord, ImageReference, ImageStore};

/// Read access to content-addressed blobs.
pub trait ContentSource {
    /// Open a blob for streaming. Missing blobs are `StowError::NotFound`.
    fn open_blob(&self, digest: &str) -> Result<Box<dyn Read + Send>>;

    /// Read a whole blob into memory.
    fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open_blob(digest)?.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// The runtime operations exports and prunes depend on.
pub trait RuntimeClient: ContentSource {
    /// Every container record of a namespace, whatever its status.
    fn list_containers(&self, namespace: &str) -> Result<Vec<ContainerRecord>>;

    /// Resolve a user-supplied reference to a stored image.
    fn resolve_image(&self, reference: &str) -> Result<ResolvedImage>;
}

/// Runtime client over the local data root.
pub struct LocalRuntime {
    layout: StoreLayout,
    images: ImageStore,
}

impl LocalRuntime {
    /// Open the stores of `layout`'s namespace.
    pub fn open(layout: &StoreLayout) -> Result<Self> {
        let images = ImageStore::new(&layout.content_dir(), &layout.images_file())?;
        Ok(Self {
            layout: layout.clone(),
            images,
        })
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Find the index record for a reference.
    ///
    /// Tried in order: the exact stored name, the normalized name
    /// (`nginx` → `docker.io/library/nginx:latest`), a pinned digest, and
    /// finally an image ID (full digest or a prefix of at least 12 hex
    /// characters).
    fn find_record(&self, reference: &str) -> Result<ImageRecord> {
        if let Some(record) = self.images.get(reference) {
            return Ok(record);
        }

        if let Ok(parsed) = ImageReference::parse(reference) {
            if let Some(record) = parsed.tagged_name().and_then(|name| self.images.get(&name)) {
                if parsed
                    .digest
                    .as_ref()
                    .map_or(true, |digest| *digest == record.target.digest)
                {
                    return Ok(record);
                }
            }
            if let Some(digest) = &parsed.digest {
                let repository = parsed.repository_name();
                if let Some(record) = self.images.list().into_iter().find(|r| {
                    r.target.digest == *digest
                        && ImageReference::parse(&r.name)
                            .is_ok_and(|stored| stored.repository_name() == repository)
                }) {
                    return Ok(record);
                }
            }
        }

        self.images
            .find_by_digest(reference)?
            .ok_or_else(|| StowError::not_found("image", reference))
    }
}

impl ContentSource for LocalRuntime {
    fn open_blob(&self, digest: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.images.open_blob(digest)?))
    }

    fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        self.images.read_blob(digest)
    }
}

impl RuntimeClient for LocalRuntime {
    fn list_containers(&self, namespace: &str) -> Result<Vec<ContainerRecord>> {
        validate_namespace(namespace)?;
        let path = self.layout.for_namespace(namespace).containers_file();
        let store = ContainerStore::load(&path)?;
        Ok(store.records().to_vec())
    }

    fn resolve_image(&self, reference: &str) -> Result<ResolvedImage> {
        let record = self.find_record(reference)?;
        let bytes = self.images.read_blob(&record.target.digest)?;
        let target = parse_target(&record.target, &bytes)
            .map_err(|e| StowError::Serialization(e.to_string()))?;

        tracing::debug!(
            reference,
            name = %record.name,
            digest = %record.target.digest,
            "Resolved image"
        );
        Ok(ResolvedImage {
            name: record.name,
            target,
        })
    }
}
