use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StowError};

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

const MAX_NAMESPACE_LEN: usize = 76;

/// Options shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalOptions {
    /// Namespace that images, containers and volumes are scoped to
    pub namespace: String,

    /// Root directory for all persistent state
    pub data_root: PathBuf,

    /// Enable debug logging
    pub debug: bool,
}

impl GlobalOptions {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data_root: data_root.into(),
            debug: false,
        }
    }

    /// Validate and return the on-disk layout for these options.
    pub fn layout(&self) -> Result<StoreLayout> {
        validate_namespace(&self.namespace)?;
        Ok(StoreLayout::new(&self.data_root, &self.namespace))
    }
}

/// Options for `save`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSaveOptions {
    pub global: GlobalOptions,
    /// References in command-line order
    pub images: Vec<String>,
    /// Archive path; `None` streams to stdout
    pub output: Option<PathBuf>,
    /// Raw `--platform` values, possibly comma-separated
    pub platforms: Vec<String>,
    pub all_platforms: bool,
}

/// Options for `volume prune`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumePruneOptions {
    pub global: GlobalOptions,
    /// Skip the confirmation prompt
    pub force: bool,
}

/// Paths of every store under a data root for one namespace.
///
/// ```text
/// <data_root>/
/// ├── content/blobs/sha256/<hex>     (shared by all namespaces)
/// └── <namespace>/
///     ├── images.json
///     ├── containers.json
///     ├── volumes.json
///     └── volumes/<name>/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    namespace: String,
}

impl StoreLayout {
    pub fn new(root: &Path, namespace: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            namespace: namespace.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Same data root, different namespace.
    pub fn for_namespace(&self, namespace: &str) -> Self {
        Self::new(&self.root, namespace)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("content")
    }

    pub fn namespace_dir(&self) -> PathBuf {
        self.root.join(&self.namespace)
    }

    pub fn images_file(&self) -> PathBuf {
        self.namespace_dir().join("images.json")
    }

    pub fn containers_file(&self) -> PathBuf {
        self.namespace_dir().join("containers.json")
    }

    pub fn volumes_file(&self) -> PathBuf {
        self.namespace_dir().join("volumes.json")
    }

    pub fn volumes_dir(&self) -> PathBuf {
        self.namespace_dir().join("volumes")
    }
}

/// Check a namespace name: `[A-Za-z0-9]+([._-][A-Za-z0-9]+)*`.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    let invalid = || {
        StowError::Config(format!(
            "namespace {namespace:?} must be alphanumeric components separated by '.', '_' or '-'"
        ))
    };

    if namespace.is_empty() || namespace.len() > MAX_NAMESPACE_LEN {
        return Err(invalid());
    }

    let mut previous_separator = true;
    for c in namespace.chars() {
        if c.is_ascii_alphanumeric() {
            previous_separator = false;
        } else if matches!(c, '.' | '_' | '-') && !previous_separator {
            previous_separator = true;
        } else {
            return Err(invalid());
        }
    }
    if previous_separator {
        return Err(invalid());
    }
    Ok(())
}
