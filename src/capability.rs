//! Pluggable capabilities (skills) and the registry that collects them
//!
//! A capability bundles operations with an availability predicate and
//! optional usage instructions. The engine only sees the per-turn
//! [`RegistrySnapshot`]; adding a capability means adding a row to the
//! table in `skills`.

mod descriptor;
mod loader;
mod manifest;
mod registry;
mod skill_access;

pub use descriptor::{
    parse_args, Capability, CapabilityMetadata, CapabilitySummary, Operation, OperationError,
};
pub use loader::{load, CapabilityContext, CapabilityError, CapabilityFactory};
pub use manifest::SkillManifest;
pub use registry::{CapabilityRegistry, OperationSet, RegistrySnapshot};
