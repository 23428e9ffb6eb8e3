//! OCI `index.json` for an archive.
//!
//! One entry per exported (image, platform) pair, annotated with the image
//! name the way containerd's importer expects.

use std::collections::BTreeMap;
use std::io;

use a3s_stow_core::error::ExportError;
use a3s_stow_core::image::MEDIA_TYPE_OCI_INDEX;
use a3s_stow_core::platform::Platform;
use serde::Serialize;

use super::archive::ExportImage;

const ANNOTATION_IMAGE_NAME: &str = "io.containerd.image.name";
const ANNOTATION_REF_NAME: &str = "org.opencontainers.image.ref.name";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OciIndex<'a> {
    schema_version: u32,
    media_type: &'static str,
    manifests: Vec<IndexEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry<'a> {
    media_type: &'a str,
    digest: &'a str,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<&'a Platform>,
    annotations: BTreeMap<&'static str, &'a str>,
}

pub(crate) fn index_json(images: &[ExportImage]) -> Result<Vec<u8>, ExportError> {
    let manifests = images
        .iter()
        .flat_map(|image| {
            image.manifests.iter().map(move |m| {
                let mut annotations = BTreeMap::new();
                annotations.insert(ANNOTATION_IMAGE_NAME, image.name.as_str());
                if let Some(tag) = image.tag() {
                    annotations.insert(ANNOTATION_REF_NAME, tag);
                }
                IndexEntry {
                    media_type: &m.descriptor.media_type,
                    digest: &m.descriptor.digest,
                    size: m.descriptor.size,
                    platform: m.platform.as_ref(),
                    annotations,
                }
            })
        })
        .collect();

    let index = OciIndex {
        schema_version: 2,
        media_type: MEDIA_TYPE_OCI_INDEX,
        manifests,
    };
    Ok(serde_json::to_vec(&index).map_err(io::Error::from)?)
}
