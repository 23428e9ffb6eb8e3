//! Container records used to decide which volumes are still referenced.

mod store;

pub use store::ContainerStore;
