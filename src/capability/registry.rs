//! Capability registry and per-turn operation sets

use super::descriptor::{Capability, CapabilitySummary, Operation};
use super::skill_access;
use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered collection of capabilities keyed by name
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability. A capability with the same name is replaced in
    /// place, keeping its position.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.metadata().name.clone();
        if let Some(slot) = self
            .capabilities
            .iter_mut()
            .find(|c| c.metadata().name == name)
        {
            tracing::warn!(capability = %name, "Capability already registered, overwriting");
            *slot = capability;
        } else {
            tracing::info!(
                capability = %name,
                version = %capability.metadata().version,
                "Registered capability"
            );
            self.capabilities.push(capability);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.iter().find(|c| c.metadata().name == name)
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capabilities whose availability predicate holds for `config`
    pub fn available<'a>(
        &'a self,
        config: &'a Config,
    ) -> impl Iterator<Item = &'a Arc<dyn Capability>> + 'a {
        self.capabilities
            .iter()
            .filter(move |c| c.is_available(config))
    }

    pub fn operation_set(&self, config: &Config) -> OperationSet {
        self.available(config)
            .flat_map(|c| c.operations(config))
            .collect()
    }

    pub fn capability_index(&self, config: &Config) -> Vec<CapabilitySummary> {
        self.available(config)
            .map(|c| CapabilitySummary::from(c.metadata()))
            .collect()
    }

    /// Non-empty instructions of available capabilities, blank-line separated
    pub fn combined_instructions(&self, config: &Config) -> String {
        self.available(config)
            .filter_map(|c| c.instructions())
            .filter(|i| !i.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Everything one turn needs, evaluated against a single configuration.
    ///
    /// The operation set also carries `list_skills` and `read_skill`, bound
    /// to this registry and `config`.
    pub fn snapshot(self: &Arc<Self>, config: &Arc<Config>) -> RegistrySnapshot {
        let mut operations = self.operation_set(config);
        for op in skill_access::operations(Arc::clone(self), Arc::clone(config)) {
            operations.insert(op);
        }
        RegistrySnapshot {
            operations,
            index: self.capability_index(config),
            instructions: self.combined_instructions(config),
        }
    }
}

/// Capability state frozen for one turn
pub struct RegistrySnapshot {
    pub operations: OperationSet,
    pub index: Vec<CapabilitySummary>,
    pub instructions: String,
}

/// Name → operation lookup for one turn.
///
/// Iteration follows first-registration order. When two operations share a
/// name the later one replaces the earlier at its position and the name is
/// recorded in [`OperationSet::collisions`].
#[derive(Default, Clone)]
pub struct OperationSet {
    operations: Vec<Arc<dyn Operation>>,
    by_name: HashMap<String, usize>,
    collisions: Vec<String>,
}

impl OperationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operation: Arc<dyn Operation>) {
        let name = operation.name().to_string();
        if let Some(&idx) = self.by_name.get(&name) {
            tracing::warn!(operation = %name, "Operation name collision, later registration wins");
            self.operations[idx] = operation;
            if !self.collisions.contains(&name) {
                self.collisions.push(name);
            }
        } else {
            self.by_name.insert(name, self.operations.len());
            self.operations.push(operation);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.by_name.get(name).map(|&idx| &self.operations[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Operation>> {
        self.operations.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }
}

impl FromIterator<Arc<dyn Operation>> for OperationSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Operation>>>(iter: I) -> Self {
        let mut set = Self::new();
        for op in iter {
            set.insert(op);
        }
        set
    }
}
