//! Volume records and batch-removal results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RemovalFailure, Result, StowError};

/// Metadata for a named volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name (unique within a namespace).
    pub name: String,

    /// Host directory holding the volume data.
    pub mount_point: String,

    /// User-defined labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// IDs of containers whose records mount this volume. Derived when the
    /// store loads; never persisted.
    #[serde(default)]
    pub in_use_by: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Volume {
    pub fn new(name: &str, mount_point: &str) -> Self {
        Self {
            name: name.to_string(),
            mount_point: mount_point.to_string(),
            labels: BTreeMap::new(),
            in_use_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Mark a container as using this volume.
    pub fn attach(&mut self, container_id: &str) {
        if !self.in_use_by.iter().any(|id| id == container_id) {
            self.in_use_by.push(container_id.to_string());
        }
    }

    pub fn is_in_use(&self) -> bool {
        !self.in_use_by.is_empty()
    }
}

/// Outcome of a batch removal: every name lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeRemoval {
    pub removed: Vec<String>,
    pub failed: Vec<RemovalFailure>,
}

impl VolumeRemoval {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn fail(&mut self, name: &str, reason: impl Into<String>) {
        self.failed.push(RemovalFailure {
            name: name.to_string(),
            reason: reason.into(),
        });
    }
}

/// Check a volume name: `[A-Za-z0-9][A-Za-z0-9_.-]+`.
pub fn validate_volume_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if name.len() < 2 || !first_ok || !rest_ok {
        return Err(StowError::InvalidName(format!(
            "volume name {name:?} must match [a-zA-Z0-9][a-zA-Z0-9_.-]+"
        )));
    }
    Ok(())
}
