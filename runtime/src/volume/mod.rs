//! Named volumes: persistent metadata plus the unused-volume collector.

mod prune;
mod store;

pub use prune::{
    is_confirmation, unused_volumes, Prompt, PruneOutcome, StreamPrompt, VolumePruner,
    PRUNE_WARNING,
};
pub use store::{VolumeInventory, VolumeStore};
