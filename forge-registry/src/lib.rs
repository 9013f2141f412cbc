//! FORGE Registry - Integration and Project Ownership
//!
//! Owns finalized integrations and the projects that reference them, applies
//! chat turn outcomes atomically, and persists everything as a JSON snapshot.

pub mod registry;
pub mod snapshot;

pub use registry::{ProjectUpdate, Registry, TurnApplication};
pub use snapshot::{RegistrySnapshot, SNAPSHOT_VERSION};
