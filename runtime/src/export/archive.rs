//! Archive assembly.
//!
//! One tar stream that both `docker load` and OCI image-layout readers
//! accept:
//!
//! ```text
//! blobs/
//! blobs/sha256/
//! blobs/sha256/<hex>      (each unique blob once, first-seen order)
//! oci-layout
//! index.json              (OCI: one entry per image and platform)
//! manifest.json           (Docker: one entry per image)
//! ```
//!
//! Headers carry no timestamps or owners, so identical inputs produce
//! identical bytes.

use std::collections::HashSet;
use std::io::{self, Read, Write};

use a3s_stow_core::error::{ExportError, StowError};
use a3s_stow_core::image::BlobDescriptor;
use a3s_stow_core::platform::Platform;
use sha2::{Digest, Sha256};

use super::{docker, oci};
use crate::client::ContentSource;

const OCI_LAYOUT: &[u8] = br#"{"imageLayoutVersion":"1.0.0"}"#;

/// One platform manifest chosen for export, with the blobs it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedManifest {
    pub descriptor: BlobDescriptor,
    /// Platform from the index entry, or from the config of a
    /// single-manifest image.
    pub platform: Option<Platform>,
    pub config: BlobDescriptor,
    pub layers: Vec<BlobDescriptor>,
}

/// An image name and the manifests exported for it, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportImage {
    pub name: String,
    pub manifests: Vec<SelectedManifest>,
}

impl ExportImage {
    /// Tag part of the name (`latest` in `docker.io/library/nginx:latest`).
    pub fn tag(&self) -> Option<&str> {
        let name = self.name.split('@').next().unwrap_or(&self.name);
        let last = name.rsplit('/').next().unwrap_or(name);
        last.rsplit_once(':').map(|(_, tag)| tag)
    }

    /// Name without tag or digest.
    pub fn repository(&self) -> &str {
        let name = self.name.split('@').next().unwrap_or(&self.name);
        match self.tag() {
            Some(tag) => &name[..name.len() - tag.len() - 1],
            None => name,
        }
    }

    /// Every blob the image references: per manifest, the manifest itself,
    /// its config, then its layers.
    fn blobs(&self) -> impl Iterator<Item = &BlobDescriptor> {
        self.manifests.iter().flat_map(|m| {
            std::iter::once(&m.descriptor)
                .chain(std::iter::once(&m.config))
                .chain(m.layers.iter())
        })
    }
}

/// Everything an archive will contain, computed before any byte is written.
pub struct ArchivePlan<'a> {
    blobs: Vec<&'a BlobDescriptor>,
    index_json: Vec<u8>,
    manifest_json: Vec<u8>,
}

impl<'a> ArchivePlan<'a> {
    /// Deduplicate blobs by digest and serialize both metadata documents.
    pub fn new(images: &'a [ExportImage]) -> Result<Self, ExportError> {
        let mut seen = HashSet::new();
        let mut blobs = Vec::new();
        for blob in images.iter().flat_map(ExportImage::blobs) {
            blob_path(blob)?;
            if seen.insert(blob.digest.as_str()) {
                blobs.push(blob);
            }
        }

        Ok(Self {
            blobs,
            index_json: oci::index_json(images)?,
            manifest_json: docker::manifest_json(images)?,
        })
    }

    /// Unique blobs in archive order.
    pub fn blobs(&self) -> &[&'a BlobDescriptor] {
        &self.blobs
    }

    /// Check that every blob can be opened, without reading it.
    pub fn check_content<S>(&self, source: &S) -> Result<(), ExportError>
    where
        S: ContentSource + ?Sized,
    {
        for blob in &self.blobs {
            open(source, &blob.digest)?;
        }
        Ok(())
    }

    /// Stream the archive into `sink`, returning the bytes written.
    ///
    /// Output already written when an error occurs is left as is.
    pub fn write<S, W>(&self, source: &S, sink: W) -> Result<u64, ExportError>
    where
        S: ContentSource + ?Sized,
        W: Write,
    {
        let mut builder = tar::Builder::new(CountingWriter::new(sink));

        for dir in ["blobs/", "blobs/sha256/"] {
            let mut header = header(tar::EntryType::Directory, 0, 0o755);
            builder.append_data(&mut header, dir, io::empty())?;
        }

        for blob in &self.blobs {
            let reader = DigestReader::new(open(source, &blob.digest)?, blob)?;
            let mut header = header(tar::EntryType::Regular, blob.size, 0o644);
            builder.append_data(&mut header, blob_path(blob)?, reader)?;
            tracing::debug!(digest = %blob.digest, size = blob.size, "Wrote blob");
        }

        for (path, data) in [
            ("oci-layout", OCI_LAYOUT),
            ("index.json", self.index_json.as_slice()),
            ("manifest.json", self.manifest_json.as_slice()),
        ] {
            let mut header = header(tar::EntryType::Regular, data.len() as u64, 0o644);
            builder.append_data(&mut header, path, data)?;
        }

        let mut counter = builder.into_inner()?;
        counter.flush()?;
        Ok(counter.written)
    }
}

/// Write one archive holding `images` to `sink`.
pub fn assemble<S, W>(images: &[ExportImage], source: &S, sink: W) -> Result<u64, ExportError>
where
    S: ContentSource + ?Sized,
    W: Write,
{
    ArchivePlan::new(images)?.write(source, sink)
}

fn header(entry_type: tar::EntryType, size: u64, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_ustar();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header
}

fn blob_path(blob: &BlobDescriptor) -> Result<String, ExportError> {
    blob.blob_path().map_err(|e| ExportError::InvalidManifest {
        digest: blob.digest.clone(),
        reason: e.to_string(),
    })
}

fn open<S>(source: &S, digest: &str) -> Result<Box<dyn Read + Send>, ExportError>
where
    S: ContentSource + ?Sized,
{
    source.open_blob(digest).map_err(|e| match e {
        StowError::NotFound { .. } => ExportError::MissingContent {
            digest: digest.to_string(),
        },
        StowError::Io(e) => ExportError::Io(e),
        other => ExportError::Io(io::Error::other(other.to_string())),
    })
}

/// Sink wrapper that counts bytes written.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that fails unless the stream has exactly the descriptor's size
/// and digest. Excess bytes are rejected before they reach the archive.
struct DigestReader<R> {
    inner: R,
    digest: String,
    expected_hex: String,
    expected_size: u64,
    read: u64,
    hasher: Sha256,
}

impl<R: Read> DigestReader<R> {
    fn new(inner: R, blob: &BlobDescriptor) -> Result<Self, ExportError> {
        let expected_hex = blob_path(blob)?
            .trim_start_matches("blobs/sha256/")
            .to_string();
        Ok(Self {
            inner,
            digest: blob.digest.clone(),
            expected_hex,
            expected_size: blob.size,
            read: 0,
            hasher: Sha256::new(),
        })
    }

    fn corrupt(&self, reason: String) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("blob {}: {}", self.digest, reason),
        )
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            if self.read != self.expected_size {
                return Err(self.corrupt(format!(
                    "expected {} bytes, found {}",
                    self.expected_size, self.read
                )));
            }
            let actual = hex::encode(self.hasher.finalize_reset());
            if actual != self.expected_hex {
                return Err(self.corrupt(format!("content hashes to sha256:{actual}")));
            }
            return Ok(0);
        }

        self.read += n as u64;
        if self.read > self.expected_size {
            return Err(self.corrupt(format!("larger than {} bytes", self.expected_size)));
        }
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
