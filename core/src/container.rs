//! Container records as seen by volume bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a container record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Stopped,
}

/// What a mount's `source` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// `source` is a named volume.
    Volume,
    /// `source` is a host path.
    Bind,
    /// `source` is ignored.
    Tmpfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub kind: MountKind,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

impl MountPoint {
    pub fn volume(name: &str, target: &str) -> Self {
        Self {
            kind: MountKind::Volume,
            source: name.to_string(),
            target: target.to_string(),
            read_only: false,
        }
    }

    pub fn bind(host_path: &str, target: &str) -> Self {
        Self {
            kind: MountKind::Bind,
            source: host_path.to_string(),
            target: target.to_string(),
            read_only: false,
        }
    }
}

/// Metadata record for a single container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    #[serde(default)]
    pub mounts: Vec<MountPoint>,
    pub created_at: DateTime<Utc>,
}

impl ContainerRecord {
    pub fn new(id: &str, name: &str, image: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            image: image.to_string(),
            status: ContainerStatus::Created,
            mounts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_mount(mut self, mount: MountPoint) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Names of the volumes this container mounts.
    pub fn volume_names(&self) -> impl Iterator<Item = &str> {
        self.mounts
            .iter()
            .filter(|m| m.kind == MountKind::Volume)
            .map(|m| m.source.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_names_skip_binds() {
        let record = ContainerRecord::new("c1", "web", "nginx")
            .with_mount(MountPoint::volume("data", "/data"))
            .with_mount(MountPoint::bind("/srv/www", "/usr/share/nginx/html"))
            .with_mount(MountPoint::volume("cache", "/cache"));

        let names: Vec<&str> = record.volume_names().collect();
        assert_eq!(names, vec!["data", "cache"]);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerStatus::Stopped).unwrap();
        assert_eq!(json, r#""stopped""#);
    }

    #[test]
    fn test_record_roundtrip_without_mounts_field() {
        let json = r#"{"id":"c1","name":"web","image":"nginx","status":"running","created_at":"2024-01-01T00:00:00Z"}"#;
        let record: ContainerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, ContainerStatus::Running);
        assert!(record.mounts.is_empty());
    }
}
