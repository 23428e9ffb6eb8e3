//! A3S Stow Core - Foundational Types
//!
//! Data model, configuration values and the error taxonomy shared by the
//! runtime and the CLI.

pub mod config;
pub mod container;
pub mod error;
pub mod image;
pub mod platform;
pub mod volume;

// Re-export commonly used types
pub use config::{GlobalOptions, ImageSaveOptions, StoreLayout, VolumePruneOptions};
pub use container::{ContainerRecord, ContainerStatus, MountKind, MountPoint};
pub use error::{
    ExportError, OrchestratorError, PruneError, RemovalFailure, Result, SelectionError, StowError,
};
pub use image::{BlobDescriptor, ImageTarget, ManifestEntry, ResolvedImage};
pub use platform::Platform;
pub use volume::{Volume, VolumeRemoval};

/// A3S Stow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
