//! Persistent container records for one namespace.
//!
//! Records are kept in `<namespace>/containers.json` and rewritten
//! atomically (write to `.tmp`, then rename) on every change.

use std::path::{Path, PathBuf};

use a3s_stow_core::container::ContainerRecord;
use a3s_stow_core::error::{Result, StowError};

/// Persistent container state file backed by JSON.
pub struct ContainerStore {
    path: PathBuf,
    records: Vec<ContainerRecord>,
}

impl ContainerStore {
    /// Load records from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str(&data).map_err(|e| {
                StowError::Serialization(format!(
                    "failed to parse container state {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            Vec::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Save records atomically.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Add a record and persist.
    pub fn add(&mut self, record: ContainerRecord) -> Result<()> {
        if self.find(&record.id).is_some() {
            return Err(StowError::Other(format!(
                "container '{}' already exists",
                record.id
            )));
        }
        self.records.push(record);
        self.save()
    }

    /// Find a record by ID or name.
    pub fn find(&self, id_or_name: &str) -> Option<&ContainerRecord> {
        self.records
            .iter()
            .find(|r| r.id == id_or_name || r.name == id_or_name)
    }

    /// Every record regardless of status, in insertion order.
    pub fn records(&self) -> &[ContainerRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_stow_core::container::{ContainerStatus, MountPoint};
    use tempfile::TempDir;

    fn record(id: &str, name: &str) -> ContainerRecord {
        ContainerRecord::new(id, name, "docker.io/library/nginx:latest")
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ContainerStore::load(&tmp.path().join("containers.json")).unwrap();
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_add_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ns").join("containers.json");

        let mut store = ContainerStore::load(&path).unwrap();
        let mut stopped = record("c1", "web").with_mount(MountPoint::volume("data", "/data"));
        stopped.status = ContainerStatus::Stopped;
        store.add(stopped).unwrap();

        let reloaded = ContainerStore::load(&path).unwrap();
        assert_eq!(reloaded.records().len(), 1);
        let web = reloaded.find("web").unwrap();
        assert_eq!(web.status, ContainerStatus::Stopped);
        assert_eq!(web.volume_names().collect::<Vec<_>>(), vec!["data"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_add_duplicate_id_fails() {
        let tmp = TempDir::new().unwrap();
        let mut store = ContainerStore::load(&tmp.path().join("containers.json")).unwrap();
        store.add(record("c1", "web")).unwrap();
        assert!(store.add(record("c1", "other")).is_err());
    }

    #[test]
    fn test_load_corrupt_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("containers.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ContainerStore::load(&path),
            Err(StowError::Serialization(_))
        ));
    }
}
