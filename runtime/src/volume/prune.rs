//! Removal of volumes no container references.
//!
//! ```text
//! AwaitingConfirmation ──(declined)──▶ Cancelled
//!        │ (confirmed / forced)
//!        ▼
//!    Computing ──▶ Removing ──▶ Done { removed, failure }
//! ```
//!
//! A volume counts as used while any container record mounts it, whatever
//! that container's status. The store has the final say on each removal.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use a3s_stow_core::container::ContainerRecord;
use a3s_stow_core::error::{PruneError, RemovalFailure};
use a3s_stow_core::volume::Volume;

use super::store::VolumeInventory;
use crate::client::RuntimeClient;

/// Warning shown before pruning without `--force`.
pub const PRUNE_WARNING: &str = "WARNING! This will remove all local volumes not used by at least one container.\nAre you sure you want to continue? [y/N] ";

/// Source of the user's answer to the confirmation prompt.
pub trait Prompt {
    /// Show `message` and return the raw answer. End of input is an empty answer.
    fn ask(&mut self, message: &str) -> std::io::Result<String>;
}

impl<F> Prompt for F
where
    F: FnMut(&str) -> std::io::Result<String>,
{
    fn ask(&mut self, message: &str) -> std::io::Result<String> {
        self(message)
    }
}

/// Prompt over an input/output pair, normally stdin and stdout.
pub struct StreamPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StreamPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompt for StreamPrompt<R, W> {
    fn ask(&mut self, message: &str) -> std::io::Result<String> {
        self.output.write_all(message.as_bytes())?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line)
    }
}

/// Only a first token of `y` or `Y` confirms.
pub fn is_confirmation(answer: &str) -> bool {
    answer
        .split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("y"))
}

/// Result of a prune that was not aborted.
#[derive(Debug)]
pub enum PruneOutcome {
    /// The user declined; nothing was touched.
    Cancelled,
    /// Removal ran. `removed` lists what the store confirmed; `failure`
    /// describes anything it refused.
    Done {
        removed: Vec<String>,
        failure: Option<PruneError>,
    },
}

impl PruneOutcome {
    pub fn removed(&self) -> &[String] {
        match self {
            PruneOutcome::Cancelled => &[],
            PruneOutcome::Done { removed, .. } => removed,
        }
    }
}

/// Names of volumes not mounted by any container, in inventory order.
pub fn unused_volumes(volumes: &[Volume], containers: &[ContainerRecord]) -> Vec<String> {
    let used: HashSet<&str> = containers.iter().flat_map(|c| c.volume_names()).collect();

    volumes
        .iter()
        .filter(|v| !used.contains(v.name.as_str()))
        .map(|v| v.name.clone())
        .collect()
}

/// Prune unused volumes of one namespace.
pub struct VolumePruner<'a> {
    volumes: &'a dyn VolumeInventory,
    client: &'a dyn RuntimeClient,
    namespace: &'a str,
}

impl<'a> VolumePruner<'a> {
    pub fn new(
        volumes: &'a dyn VolumeInventory,
        client: &'a dyn RuntimeClient,
        namespace: &'a str,
    ) -> Self {
        Self {
            volumes,
            client,
            namespace,
        }
    }

    /// Run the prune. `force` skips the prompt.
    ///
    /// `Err` is returned only when nothing was removed; a partially
    /// successful batch comes back as `Ok(Done { failure: Some(..), .. })`.
    pub fn prune(&self, force: bool, prompt: &mut dyn Prompt) -> Result<PruneOutcome, PruneError> {
        if !force {
            let answer = prompt.ask(PRUNE_WARNING)?;
            if !is_confirmation(&answer) {
                tracing::debug!("Volume prune declined");
                return Ok(PruneOutcome::Cancelled);
            }
        }

        let volumes = self
            .volumes
            .list(false)
            .map_err(|e| PruneError::InventoryUnavailable(format!("listing volumes: {e}")))?;
        let containers = self
            .client
            .list_containers(self.namespace)
            .map_err(|e| PruneError::InventoryUnavailable(format!("listing containers: {e}")))?;

        let candidates = unused_volumes(&volumes, &containers);
        tracing::debug!(
            namespace = self.namespace,
            volumes = volumes.len(),
            containers = containers.len(),
            candidates = candidates.len(),
            "Computed unused volumes"
        );

        if candidates.is_empty() {
            return Ok(PruneOutcome::Done {
                removed: Vec::new(),
                failure: None,
            });
        }

        let removal = self.volumes.remove(&candidates).map_err(|e| {
            PruneError::RemovalFailed {
                failures: candidates
                    .iter()
                    .map(|name| RemovalFailure {
                        name: name.clone(),
                        reason: e.to_string(),
                    })
                    .collect(),
            }
        })?;

        tracing::info!(
            removed = removal.removed.len(),
            failed = removal.failed.len(),
            "Pruned volumes"
        );

        let failure = (!removal.failed.is_empty()).then(|| PruneError::RemovalFailed {
            failures: removal.failed,
        });
        Ok(PruneOutcome::Done {
            removed: removal.removed,
            failure,
        })
    }
}
