//! Persistent storage for volume metadata.
//!
//! Volumes are stored as JSON in `<namespace>/volumes.json` with atomic writes
//! (write to tmp file, then rename) to prevent corruption. Volume data lives
//! under `<namespace>/volumes/<name>/`. Mutations take an exclusive lock on
//! `volumes.lock` so concurrent processes serialize their removals.
//!
//! Usage is not persisted: when the store knows the namespace's container
//! state file, every load fills `in_use_by` from the container records, so a
//! removal sees containers created after the caller took its snapshot.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use a3s_stow_core::config::StoreLayout;
use a3s_stow_core::error::{Result, StowError};
use a3s_stow_core::volume::{validate_volume_name, Volume, VolumeRemoval};
use fs4::fs_std::FileExt;

use crate::container::ContainerStore;

/// Read/remove access to the volume inventory.
///
/// The collector only needs these two operations; [`VolumeStore`] is the
/// on-disk implementation.
pub trait VolumeInventory {
    /// List volumes in name order. Inactive volumes (metadata whose data
    /// directory is gone) are only returned when `include_inactive` is set.
    fn list(&self, include_inactive: bool) -> Result<Vec<Volume>>;

    /// Remove a batch of volumes, reporting per-name success or failure.
    ///
    /// `Err` means nothing was removed.
    fn remove(&self, names: &[String]) -> Result<VolumeRemoval>;
}

/// Persistent store for volume metadata.
#[derive(Debug)]
pub struct VolumeStore {
    /// Path to the JSON file.
    path: PathBuf,
    /// Base directory for volume data.
    volumes_dir: PathBuf,
    /// Container state consulted for volume usage.
    containers_file: Option<PathBuf>,
}

/// Serializable wrapper for the volumes file.
#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
struct VolumesFile {
    volumes: BTreeMap<String, Volume>,
}

/// Exclusive advisory lock held for the lifetime of a mutation.
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        // Released when the file is closed.
        FileExt::lock_exclusive(&file).map_err(|e| {
            StowError::Other(format!("failed to lock {}: {}", path.display(), e))
        })?;
        Ok(Self { _file: file })
    }
}

impl VolumeStore {
    /// Create a new store at the given path.
    pub fn new(path: impl Into<PathBuf>, volumes_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            volumes_dir: volumes_dir.into(),
            containers_file: None,
        }
    }

    /// Create the store for a namespace layout, tracking usage through the
    /// namespace's container records.
    pub fn for_layout(layout: &StoreLayout) -> Self {
        Self::new(layout.volumes_file(), layout.volumes_dir())
            .with_containers_file(layout.containers_file())
    }

    /// Derive volume usage from the container records at `path`.
    pub fn with_containers_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.containers_file = Some(path.into());
        self
    }

    /// Load all volumes from disk.
    fn load(&self) -> Result<BTreeMap<String, Volume>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            StowError::Other(format!(
                "failed to read volumes file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let file: VolumesFile = serde_json::from_str(&data)
            .map_err(|e| StowError::Serialization(format!("failed to parse volumes file: {}", e)))?;

        let mut volumes = file.volumes;
        self.mark_usage(&mut volumes)?;
        Ok(volumes)
    }

    /// Fill `in_use_by` from the container records, if any are tracked.
    fn mark_usage(&self, volumes: &mut BTreeMap<String, Volume>) -> Result<()> {
        let Some(path) = &self.containers_file else {
            return Ok(());
        };
        let containers = ContainerStore::load(path)?;
        for record in containers.records() {
            for name in record.volume_names() {
                if let Some(volume) = volumes.get_mut(name) {
                    volume.attach(&record.id);
                }
            }
        }
        Ok(())
    }

    /// Save all volumes to disk (atomic write).
    fn save(&self, volumes: &BTreeMap<String, Volume>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StowError::Other(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = VolumesFile {
            volumes: volumes
                .iter()
                .map(|(name, volume)| {
                    let mut volume = volume.clone();
                    volume.in_use_by.clear();
                    (name.clone(), volume)
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            StowError::Other(format!(
                "failed to write tmp file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            StowError::Other(format!(
                "failed to rename {} to {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&self.path.with_extension("lock"))
    }

    /// Get a single volume by name.
    pub fn get(&self, name: &str) -> Result<Option<Volume>> {
        Ok(self.load()?.remove(name))
    }

    /// Create a named volume and its data directory.
    pub fn create(&self, name: &str, labels: BTreeMap<String, String>) -> Result<Volume> {
        validate_volume_name(name)?;
        let _lock = self.lock()?;
        let mut volumes = self.load()?;

        if volumes.contains_key(name) {
            return Err(StowError::Other(format!("volume '{}' already exists", name)));
        }

        let vol_dir = self.volume_dir(name);
        std::fs::create_dir_all(&vol_dir).map_err(|e| {
            StowError::Other(format!(
                "failed to create volume directory {}: {}",
                vol_dir.display(),
                e
            ))
        })?;

        let mut volume = Volume::new(name, &vol_dir.to_string_lossy());
        volume.labels = labels;

        volumes.insert(name.to_string(), volume.clone());
        self.save(&volumes)?;
        tracing::debug!(volume = name, "Created volume");
        Ok(volume)
    }

    /// Get the volume data directory for a named volume.
    pub fn volume_dir(&self, name: &str) -> PathBuf {
        self.volumes_dir.join(name)
    }

    /// Get the store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VolumeInventory for VolumeStore {
    fn list(&self, include_inactive: bool) -> Result<Vec<Volume>> {
        Ok(self
            .load()?
            .into_values()
            .filter(|v| include_inactive || Path::new(&v.mount_point).is_dir())
            .collect())
    }

    fn remove(&self, names: &[String]) -> Result<VolumeRemoval> {
        let _lock = self.lock()?;
        let mut volumes = self.load()?;
        let mut outcome = VolumeRemoval::default();
        let mut doomed = Vec::new();

        for name in names {
            match volumes.get(name) {
                None => outcome.fail(name, "no such volume"),
                Some(v) if v.is_in_use() => outcome.fail(
                    name,
                    format!("volume is in use by {}", v.in_use_by.join(", ")),
                ),
                Some(_) => {
                    if let Some(v) = volumes.remove(name) {
                        doomed.push(v);
                    }
                }
            }
        }

        if doomed.is_empty() {
            return Ok(outcome);
        }

        // Metadata first: once saved, the volumes are gone even if a data
        // directory below cannot be deleted.
        self.save(&volumes)?;

        for volume in doomed {
            let dir = self.volume_dir(&volume.name);
            if dir.exists() {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    tracing::warn!(
                        volume = %volume.name,
                        dir = %dir.display(),
                        error = %e,
                        "Failed to delete volume data directory"
                    );
                }
            }
            tracing::debug!(volume = %volume.name, "Removed volume");
            outcome.removed.push(volume.name);
        }

        Ok(outcome)
    }
}
