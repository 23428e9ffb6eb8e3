use std::path::PathBuf;

use thiserror::Error;

/// A3S Stow store and client errors
#[derive(Error, Debug)]
pub enum StowError {
    /// A named entity (image, blob, volume, container) does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Image reference could not be parsed
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Digest is not a well-formed `sha256:<hex>` string
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    /// Volume or namespace name failed validation
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StowError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StowError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether this error means the requested entity is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StowError::NotFound { .. } => true,
            StowError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StowError {
    fn from(err: serde_json::Error) -> Self {
        StowError::Serialization(err.to_string())
    }
}

/// Result type alias for A3S Stow store operations
pub type Result<T> = std::result::Result<T, StowError>;

/// Platform selection failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// None of the requested platforms is present in the manifest list
    #[error("none of the requested platforms [{requested}] is available (have: [{available}])")]
    NoMatchingPlatform { requested: String, available: String },

    /// The default (host) platform is not present in the manifest list
    #[error("host platform {host} is not available (have: [{available}])")]
    HostPlatformNotFound { host: String, available: String },

    /// A platform string could not be parsed
    #[error("invalid platform {0:?}")]
    InvalidPlatform(String),
}

/// Archive assembly failures.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A digest referenced by a manifest is not in the content store
    #[error("content not found: {digest}")]
    MissingContent { digest: String },

    /// An image reference did not resolve to a stored image
    #[error("unable to resolve image {reference}: {reason}")]
    UnresolvedReference { reference: String, reason: String },

    /// A manifest or manifest list could not be parsed
    #[error("invalid manifest {digest}: {reason}")]
    InvalidManifest { digest: String, reason: String },

    /// Reading content or writing the archive failed
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Multi-image export failures.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("requires at least 1 image reference")]
    NoImagesSpecified,

    #[error("image {reference}: {source}")]
    Selection {
        reference: String,
        #[source]
        source: SelectionError,
    },

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("failed to open {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single volume the store refused to remove.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemovalFailure {
    pub name: String,
    pub reason: String,
}

impl std::fmt::Display for RemovalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Volume prune failures.
#[derive(Error, Debug)]
pub enum PruneError {
    /// Listing volumes or containers failed
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),

    /// The store refused or failed to remove one or more volumes
    #[error("failed to remove volumes: {}", join_failures(.failures))]
    RemovalFailed { failures: Vec<RemovalFailure> },

    /// Reading the confirmation answer failed
    #[error("confirmation prompt failed: {0}")]
    Confirmation(#[from] std::io::Error),
}

fn join_failures(failures: &[RemovalFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = StowError::not_found("volume", "data");
        assert_eq!(error.to_string(), "volume not found: data");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_io_not_found_is_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: StowError = io_error.into();
        assert!(matches!(error, StowError::Io(_)));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_io_other_is_not_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let error: StowError = io_error.into();
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let error: StowError = result.unwrap_err().into();
        assert!(matches!(error, StowError::Serialization(_)));
    }

    #[test]
    fn test_selection_error_display() {
        let error = SelectionError::HostPlatformNotFound {
            host: "linux/amd64".to_string(),
            available: "linux/arm64".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "host platform linux/amd64 is not available (have: [linux/arm64])"
        );
    }

    #[test]
    fn test_export_error_display() {
        let error = ExportError::MissingContent {
            digest: "sha256:abc".to_string(),
        };
        assert_eq!(error.to_string(), "content not found: sha256:abc");
    }

    #[test]
    fn test_orchestrator_wraps_export() {
        let error: OrchestratorError = ExportError::UnresolvedReference {
            reference: "nginx".to_string(),
            reason: "image not found".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "unable to resolve image nginx: image not found"
        );
    }

    #[test]
    fn test_no_images_display() {
        assert_eq!(
            OrchestratorError::NoImagesSpecified.to_string(),
            "requires at least 1 image reference"
        );
    }

    #[test]
    fn test_removal_failed_lists_every_name() {
        let error = PruneError::RemovalFailed {
            failures: vec![
                RemovalFailure {
                    name: "v3".to_string(),
                    reason: "in use".to_string(),
                },
                RemovalFailure {
                    name: "v4".to_string(),
                    reason: "not found".to_string(),
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "failed to remove volumes: v3: in use, v4: not found"
        );
    }
}
