//! Registry construction from the compile-time capability table

use super::descriptor::Capability;
use super::registry::CapabilityRegistry;
use crate::skills::ProfileStore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("manifest for '{id}' is invalid: {reason}")]
    Manifest { id: String, reason: String },
    #[error("failed to initialize '{id}': {reason}")]
    Init { id: String, reason: String },
}

/// Shared services handed to capability factories
#[derive(Clone)]
pub struct CapabilityContext {
    pub profiles: Arc<ProfileStore>,
}

pub type CapabilityFactory =
    fn(&CapabilityContext) -> Result<Arc<dyn Capability>, CapabilityError>;

/// Build a registry from `table`.
///
/// `enabled` restricts loading to the named identifiers, in table order.
/// Unknown identifiers and failing factories are logged and skipped.
pub fn load(
    table: &[(&str, CapabilityFactory)],
    enabled: Option<&[String]>,
    ctx: &CapabilityContext,
) -> CapabilityRegistry {
    if let Some(enabled) = enabled {
        for id in enabled {
            if !table.iter().any(|(known, _)| known == id) {
                tracing::warn!(capability = %id, "Unknown capability identifier, skipping");
            }
        }
    }

    let mut registry = CapabilityRegistry::new();
    for (id, factory) in table {
        if enabled.is_some_and(|list| !list.iter().any(|e| e == id)) {
            tracing::debug!(capability = %id, "Capability not enabled");
            continue;
        }
        match factory(ctx) {
            Ok(capability) => registry.register(capability),
            Err(e) => {
                tracing::error!(capability = %id, error = %e, "Failed to load capability");
            }
        }
    }
    if registry.is_empty() {
        tracing::warn!("No capabilities loaded; every turn will be answered directly");
    } else {
        tracing::debug!(count = registry.len(), "Capability registry built");
    }
    registry
}
