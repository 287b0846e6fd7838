//! User profile capability and its JSON-file store

use super::BuiltinSkill;
use crate::capability::{
    parse_args, Capability, CapabilityContext, CapabilityError, Operation, OperationError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const MANIFEST: &str = include_str!("manifests/user-profile.md");
const MEMORIES: &str = "memories";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("profile serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("profile at {} is unreadable, refusing to overwrite: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Free-form profile: a list of memories plus arbitrary string fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub memories: Vec<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    Updated,
    /// `memories` cannot be set as a field
    Reserved,
}

/// Profile persisted as pretty JSON. Writes are serialized so concurrent
/// operations and the memory agent never interleave read-modify-write.
pub struct ProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current profile. Missing or unreadable files yield an empty profile.
    pub async fn load(&self) -> UserProfile {
        let _guard = self.lock.lock().await;
        self.read().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to load user profile");
            UserProfile::default()
        })
    }

    /// Only a missing file reads as empty. Anything else is an error so the
    /// writers below never replace a profile they could not read.
    async fn read(&self) -> Result<UserProfile, ProfileError> {
        let unreadable = |source: Box<dyn std::error::Error + Send + Sync>| {
            ProfileError::Unreadable {
                path: self.path.clone(),
                source,
            }
        };
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(UserProfile::default())
            }
            Err(e) => return Err(unreadable(Box::new(e))),
        };
        serde_json::from_str(&data).map_err(|e| unreadable(Box::new(e)))
    }

    /// Write to a sibling temp file, then rename over the profile.
    async fn write(&self, profile: &UserProfile) -> Result<(), ProfileError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("profile");
        let tmp_path = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));
        let data = serde_json::to_vec_pretty(profile)?;
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    pub async fn update_field(&self, key: &str, value: &str) -> Result<FieldUpdate, ProfileError> {
        if key == MEMORIES {
            return Ok(FieldUpdate::Reserved);
        }
        let _guard = self.lock.lock().await;
        let mut profile = self.read().await?;
        profile
            .fields
            .insert(key.to_string(), Value::String(value.to_string()));
        self.write(&profile).await?;
        tracing::info!(field = %key, "Updated user profile field");
        Ok(FieldUpdate::Updated)
    }

    /// Returns `false` when the memory was already stored.
    pub async fn add_memory(&self, memory: &str) -> Result<bool, ProfileError> {
        let _guard = self.lock.lock().await;
        let mut profile = self.read().await?;
        if profile.memories.iter().any(|m| m == memory) {
            return Ok(false);
        }
        profile.memories.push(memory.to_string());
        self.write(&profile).await?;
        tracing::info!(count = profile.memories.len(), "Added user memory");
        Ok(true)
    }
}

pub(super) fn build(ctx: &CapabilityContext) -> Result<Arc<dyn Capability>, CapabilityError> {
    let store = &ctx.profiles;
    BuiltinSkill::new(
        "user-profile",
        MANIFEST,
        vec![
            Arc::new(GetUserProfile {
                store: Arc::clone(store),
            }),
            Arc::new(UpdateProfileField {
                store: Arc::clone(store),
            }),
            Arc::new(AddUserMemory {
                store: Arc::clone(store),
            }),
        ],
    )
}

fn store_failure(e: &ProfileError) -> OperationError {
    OperationError::failed(e.to_string())
}

struct GetUserProfile {
    store: Arc<ProfileStore>,
}

#[async_trait]
impl Operation for GetUserProfile {
    fn name(&self) -> &str {
        "get_user_profile"
    }

    fn description(&self) -> &str {
        "Retrieve all stored information about the current user, including name, preferences, and memories."
    }

    fn argument_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, _args: Value) -> Result<String, OperationError> {
        let profile = self.store.load().await;
        serde_json::to_string_pretty(&profile).map_err(|e| OperationError::failed(e.to_string()))
    }
}

struct UpdateProfileField {
    store: Arc<ProfileStore>,
}

#[derive(Deserialize)]
struct UpdateFieldArgs {
    key: String,
    value: String,
}

#[async_trait]
impl Operation for UpdateProfileField {
    fn name(&self) -> &str {
        "update_profile_field"
    }

    fn description(&self) -> &str {
        "Update or set a specific structured field in the user's profile (e.g., name, email, location, theme_preference)."
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "The field name to set (e.g. 'name', 'email')"},
                "value": {"type": "string", "description": "The value to set"}
            },
            "required": ["key", "value"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        let UpdateFieldArgs { key, value } = parse_args(args)?;
        match self
            .store
            .update_field(&key, &value)
            .await
            .map_err(|e| store_failure(&e))?
        {
            FieldUpdate::Updated => Ok(format!(
                "Successfully updated user profile: {key} = {value}"
            )),
            FieldUpdate::Reserved => Ok(
                "Cannot overwrite 'memories' directly. Use 'add_user_memory' instead.".to_string(),
            ),
        }
    }
}

struct AddUserMemory {
    store: Arc<ProfileStore>,
}

#[derive(Deserialize)]
struct AddMemoryArgs {
    memory: String,
}

#[async_trait]
impl Operation for AddUserMemory {
    fn name(&self) -> &str {
        "add_user_memory"
    }

    fn description(&self) -> &str {
        "Add an unstructured memory, fact, or preference about the user that doesn't fit into a specific key-value field."
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "memory": {"type": "string", "description": "The fact or memory to record"}
            },
            "required": ["memory"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        let AddMemoryArgs { memory } = parse_args(args)?;
        let added = self
            .store
            .add_memory(&memory)
            .await
            .map_err(|e| store_failure(&e))?;
        Ok(if added {
            "Added new memory about the user.".to_string()
        } else {
            "Memory already exists.".to_string()
        })
    }
}
