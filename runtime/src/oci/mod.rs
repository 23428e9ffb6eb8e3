//! Local OCI image content.
//!
//! ```text
//! <data_root>/
//! ├── content/blobs/sha256/<hex>    (manifests, configs, layers)
//! └── <namespace>/images.json       (name → manifest or index descriptor)
//! ```

pub mod manifest;
pub mod reference;
pub mod store;

pub use manifest::{config_platform, parse_manifest, parse_target, ManifestLayers};
pub use reference::ImageReference;
pub use store::{ImageRecord, ImageStore};
