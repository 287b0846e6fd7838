//! Capability and operation contracts

use crate::config::Config;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Static description of a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityMetadata {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub version: String,
}

/// Entry in the capability index shown to users and to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySummary {
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl From<&CapabilityMetadata> for CapabilitySummary {
    fn from(meta: &CapabilityMetadata) -> Self {
        Self {
            name: meta.name.clone(),
            description: meta.description.clone(),
            icon: meta.icon.clone(),
        }
    }
}

/// Failure reported by an operation. The executor renders it as
/// `Error: <message>`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Deserialize operation arguments into `T`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, OperationError> {
    serde_json::from_value(args).map_err(|e| OperationError::InvalidArguments(e.to_string()))
}

/// One invocable action returning text
#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the argument object
    fn argument_schema(&self) -> Value;

    async fn invoke(&self, args: Value) -> Result<String, OperationError>;
}

/// A named, versioned bundle of operations.
///
/// Constructed once at registration and never mutated. Availability and the
/// operation list are re-evaluated against the configuration every turn.
pub trait Capability: Send + Sync {
    fn metadata(&self) -> &CapabilityMetadata;

    fn is_available(&self, config: &Config) -> bool;

    fn operations(&self, config: &Config) -> Vec<Arc<dyn Operation>>;

    /// Usage guidance injected into the router prompt
    fn instructions(&self) -> Option<&str> {
        None
    }
}
