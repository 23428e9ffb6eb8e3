//! A3S Stow Runtime - image export and volume cleanup.
//!
//! Stores for images, containers and volumes under a data root, the
//! runtime client both operations talk to, the `save` archive exporter
//! and the unused-volume collector.

pub mod client;
pub mod container;
pub mod export;
pub mod oci;
pub mod volume;

// Re-export common types
pub use client::{ContentSource, LocalRuntime, RuntimeClient};
pub use container::ContainerStore;
pub use export::{Destination, ExportImage, ImageExporter, SaveRequest, SelectedManifest};
pub use oci::{ImageRecord, ImageReference, ImageStore};
pub use volume::{
    Prompt, PruneOutcome, StreamPrompt, VolumeInventory, VolumePruner, VolumeStore, PRUNE_WARNING,
};

/// A3S Stow Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
