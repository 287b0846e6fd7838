//! Built-in capabilities
//!
//! Each built-in is a manifest embedded at compile time plus the operations
//! it exposes. [`BUILTIN_CAPABILITIES`] is the registration table the loader
//! reads; add a row here to ship a new capability.

mod calculator;
mod datetime;
mod user_profile;

pub use user_profile::{FieldUpdate, ProfileError, ProfileStore};

use crate::capability::{
    Capability, CapabilityContext, CapabilityError, CapabilityFactory, CapabilityMetadata,
    Operation, SkillManifest,
};
use crate::config::Config;
use std::sync::Arc;

pub const BUILTIN_CAPABILITIES: &[(&str, CapabilityFactory)] = &[
    ("calculator", calculator::build),
    ("datetime", datetime::build),
    ("user-profile", user_profile::build),
];

/// A capability that needs no external service and is always available
struct BuiltinSkill {
    manifest: SkillManifest,
    operations: Vec<Arc<dyn Operation>>,
}

impl BuiltinSkill {
    fn new(
        id: &str,
        manifest: &str,
        operations: Vec<Arc<dyn Operation>>,
    ) -> Result<Arc<dyn Capability>, CapabilityError> {
        let manifest = SkillManifest::parse(manifest);
        if manifest.metadata.name != id {
            return Err(CapabilityError::Manifest {
                id: id.to_string(),
                reason: format!("declares name '{}'", manifest.metadata.name),
            });
        }
        Ok(Arc::new(Self {
            manifest,
            operations,
        }))
    }
}

impl Capability for BuiltinSkill {
    fn metadata(&self) -> &CapabilityMetadata {
        &self.manifest.metadata
    }

    fn is_available(&self, _config: &Config) -> bool {
        true
    }

    fn operations(&self, _config: &Config) -> Vec<Arc<dyn Operation>> {
        self.operations.clone()
    }

    fn instructions(&self) -> Option<&str> {
        self.manifest.instructions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability;
    use crate::config::test_config;

    #[test]
    fn test_builtin_table_loads_everything() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CapabilityContext {
            profiles: Arc::new(ProfileStore::new(dir.path().join("profile.json"))),
        };
        let registry = capability::load(BUILTIN_CAPABILITIES, None, &ctx);
        let config = test_config();

        assert_eq!(registry.len(), BUILTIN_CAPABILITIES.len());
        let ops = registry.operation_set(&config);
        for name in [
            "calculator",
            "get_datetime",
            "get_user_profile",
            "update_profile_field",
            "add_user_memory",
        ] {
            assert!(ops.get(name).is_some(), "missing {name}");
        }
        assert!(ops.collisions().is_empty());
        assert!(!registry.combined_instructions(&config).is_empty());
        for summary in registry.capability_index(&config) {
            assert!(!summary.description.is_empty());
            assert_ne!(summary.icon, "");
        }
    }

    #[test]
    fn test_manifest_name_mismatch_is_rejected() {
        let result = BuiltinSkill::new("calculator", "---\nname: other\n---\n", vec![]);
        assert!(matches!(result, Err(CapabilityError::Manifest { .. })));
    }
}
