//! Image export (`save`).
//!
//! Every reference is resolved, narrowed to the requested platforms and
//! checked for missing content before the destination is opened, so a
//! failed export never creates or truncates the output file.

mod archive;
mod docker;
mod oci;
mod select;

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use a3s_stow_core::error::{ExportError, OrchestratorError, StowError};
use a3s_stow_core::image::{BlobDescriptor, ImageTarget, ManifestEntry};
use a3s_stow_core::platform::Platform;

pub use archive::{assemble, ArchivePlan, ExportImage, SelectedManifest};
pub use select::select_platforms;

use crate::client::RuntimeClient;
use crate::oci::manifest::{config_platform, parse_manifest};

/// What to export.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// References in the order given by the user.
    pub references: Vec<String>,
    /// Explicit platforms; empty means the host platform.
    pub platforms: Vec<Platform>,
    pub all_platforms: bool,
    /// Platform selected when none is requested.
    pub host: Platform,
}

impl SaveRequest {
    pub fn new(references: Vec<String>) -> Self {
        Self {
            references,
            platforms: Vec::new(),
            all_platforms: false,
            host: Platform::host(),
        }
    }

    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_all_platforms(mut self, all: bool) -> Self {
        self.all_platforms = all;
        self
    }
}

/// Where the archive goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Created or truncated once the export is known to be valid.
    File(PathBuf),
    Stdout,
}

/// Exports images from a runtime into a single archive.
pub struct ImageExporter<'a> {
    client: &'a dyn RuntimeClient,
}

impl<'a> ImageExporter<'a> {
    pub fn new(client: &'a dyn RuntimeClient) -> Self {
        Self { client }
    }

    /// Resolve every reference and pick its manifests.
    ///
    /// References naming an image already collected are skipped.
    pub fn prepare(&self, request: &SaveRequest) -> Result<Vec<ExportImage>, OrchestratorError> {
        if request.references.is_empty() {
            return Err(OrchestratorError::NoImagesSpecified);
        }

        let mut seen = HashSet::new();
        let mut images = Vec::with_capacity(request.references.len());
        for reference in &request.references {
            let resolved = self.client.resolve_image(reference).map_err(|e| {
                ExportError::UnresolvedReference {
                    reference: reference.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !seen.insert(resolved.name.clone()) {
                tracing::debug!(reference = %reference, name = %resolved.name, "Skipping duplicate image");
                continue;
            }

            let manifests = match &resolved.target {
                ImageTarget::Manifest(descriptor) => {
                    vec![self.single_manifest(reference, descriptor, request)?]
                }
                ImageTarget::Index {
                    descriptor,
                    entries,
                } => {
                    if entries.is_empty() {
                        return Err(ExportError::InvalidManifest {
                            digest: descriptor.digest.clone(),
                            reason: "index lists no manifests".to_string(),
                        }
                        .into());
                    }
                    let selected = select_platforms(
                        &request.platforms,
                        request.all_platforms,
                        &request.host,
                        entries,
                    )
                    .map_err(|source| OrchestratorError::Selection {
                        reference: reference.clone(),
                        source,
                    })?;
                    selected
                        .into_iter()
                        .map(|entry| self.indexed_manifest(entry))
                        .collect::<Result<Vec<_>, _>>()?
                }
            };

            tracing::debug!(
                reference = %reference,
                name = %resolved.name,
                manifests = manifests.len(),
                "Prepared image for export"
            );
            images.push(ExportImage {
                name: resolved.name,
                manifests,
            });
        }
        Ok(images)
    }

    /// Export into an already-open sink. Returns the archive size.
    pub fn export<W: Write>(&self, request: &SaveRequest, sink: W) -> Result<u64, OrchestratorError> {
        let images = self.prepare(request)?;
        let plan = ArchivePlan::new(&images)?;
        plan.check_content(self.client)?;
        let written = plan.write(self.client, sink)?;
        log_export(&images, written);
        Ok(written)
    }

    /// Export to a file or standard output.
    pub fn export_to(
        &self,
        request: &SaveRequest,
        destination: &Destination,
    ) -> Result<u64, OrchestratorError> {
        let images = self.prepare(request)?;
        let plan = ArchivePlan::new(&images)?;
        plan.check_content(self.client)?;

        let written = match destination {
            Destination::File(path) => {
                let file = File::create(path).map_err(|source| OrchestratorError::Destination {
                    path: path.clone(),
                    source,
                })?;
                plan.write(self.client, BufWriter::new(file))?
            }
            Destination::Stdout => plan.write(self.client, BufWriter::new(io::stdout().lock()))?,
        };
        log_export(&images, written);
        Ok(written)
    }

    fn single_manifest(
        &self,
        reference: &str,
        descriptor: &BlobDescriptor,
        request: &SaveRequest,
    ) -> Result<SelectedManifest, ExportError> {
        let layers = parse_manifest(&descriptor.digest, &self.read(&descriptor.digest)?)?;
        let platform = config_platform(&self.read(&layers.config.digest)?);

        if !request.all_platforms && !request.platforms.is_empty() {
            let compatible = platform
                .as_ref()
                .map_or(true, |p| request.platforms.iter().any(|r| r.matches(p)));
            if !compatible {
                tracing::warn!(
                    reference,
                    platform = %platform.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "Image has a single manifest for another platform; exporting it anyway"
                );
            }
        }

        Ok(SelectedManifest {
            descriptor: descriptor.clone(),
            platform,
            config: layers.config,
            layers: layers.layers,
        })
    }

    fn indexed_manifest(&self, entry: ManifestEntry) -> Result<SelectedManifest, ExportError> {
        let digest = &entry.descriptor.digest;
        let layers = parse_manifest(digest, &self.read(digest)?)?;
        Ok(SelectedManifest {
            descriptor: entry.descriptor,
            platform: entry.platform,
            config: layers.config,
            layers: layers.layers,
        })
    }

    fn read(&self, digest: &str) -> Result<Vec<u8>, ExportError> {
        self.client.read_blob(digest).map_err(|e| match e {
            StowError::NotFound { .. } => ExportError::MissingContent {
                digest: digest.to_string(),
            },
            StowError::Io(e) => ExportError::Io(e),
            other => ExportError::Io(io::Error::other(other.to_string())),
        })
    }
}

fn log_export(images: &[ExportImage], written: u64) {
    tracing::info!(
        images = images.len(),
        manifests = images.iter().map(|i| i.manifests.len()).sum::<usize>(),
        bytes = written,
        "Exported images"
    );
}
