//! Background review of the last exchange for facts worth remembering

use crate::llm::{invoke_typed, LlmError, LlmService, OutputSchema};
use crate::session::{Message, Transcript};
use crate::skills::{FieldUpdate, ProfileError, ProfileStore};
use crate::system_prompt::build_memory_prompt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryAgentError {
    #[error("memory review failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryDecision {
    should_update: bool,
    #[serde(default)]
    updates: Vec<MemoryUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UpdateKind {
    Field,
    Memory,
}

#[derive(Debug, Deserialize)]
struct MemoryUpdate {
    #[serde(rename = "type")]
    kind: UpdateKind,
    #[serde(default)]
    key: Option<String>,
    value: String,
}

fn memory_schema() -> OutputSchema {
    OutputSchema::new(
        "memory_decision",
        "Whether the user's profile should be updated from this interaction",
        json!({
            "type": "object",
            "properties": {
                "shouldUpdate": {
                    "type": "boolean",
                    "description": "True if new user info was found"
                },
                "updates": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": {
                                "type": "string",
                                "enum": ["field", "memory"],
                                "description": "'field' for structured data (name, location), 'memory' for unstructured facts"
                            },
                            "key": {
                                "type": "string",
                                "description": "Field name (required when type is 'field')"
                            },
                            "value": {
                                "type": "string",
                                "description": "The value to save"
                            }
                        },
                        "required": ["type", "value"]
                    }
                }
            },
            "required": ["shouldUpdate", "updates"]
        }),
    )
}

pub struct MemoryAgent {
    llm: Arc<dyn LlmService>,
    profiles: Arc<ProfileStore>,
    schema: OutputSchema,
}

impl MemoryAgent {
    pub fn new(llm: Arc<dyn LlmService>, profiles: Arc<ProfileStore>) -> Self {
        Self {
            llm,
            profiles,
            schema: memory_schema(),
        }
    }

    /// Review the trailing exchange of `transcript` and apply any updates.
    ///
    /// Returns how many updates changed the profile.
    pub async fn review(&self, transcript: &Transcript) -> Result<usize, MemoryAgentError> {
        let Some((user, assistant)) = transcript.last_exchange() else {
            return Ok(0);
        };
        let prompt = build_memory_prompt(user, assistant);
        let decision: MemoryDecision =
            invoke_typed(self.llm.as_ref(), &[Message::user(prompt)], &self.schema).await?;

        if !decision.should_update {
            return Ok(0);
        }

        let mut applied = 0;
        for update in decision.updates {
            match (update.kind, update.key) {
                (UpdateKind::Field, Some(key)) if !key.trim().is_empty() => {
                    if self.profiles.update_field(&key, &update.value).await?
                        == FieldUpdate::Updated
                    {
                        applied += 1;
                    }
                }
                (UpdateKind::Field, _) => {
                    tracing::debug!(value = %update.value, "Skipping field update without key");
                }
                (UpdateKind::Memory, _) => {
                    if self.profiles.add_memory(&update.value).await? {
                        applied += 1;
                    }
                }
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockLlm;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MockLlm>, Arc<ProfileStore>, MemoryAgent) {
        let dir = tempfile::tempdir().unwrap();
        let profiles = Arc::new(ProfileStore::new(dir.path().join("profile.json")));
        let llm = Arc::new(MockLlm::new());
        let agent = MemoryAgent::new(llm.clone(), Arc::clone(&profiles));
        (dir, llm, profiles, agent)
    }

    fn exchange(user: &str, assistant: &str) -> Transcript {
        [Message::user(user), Message::assistant(assistant)]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_applies_field_and_memory_updates() {
        let (_dir, llm, profiles, agent) = setup();
        llm.queue_structured(json!({
            "shouldUpdate": true,
            "updates": [
                {"type": "field", "key": "name", "value": "Ada"},
                {"type": "memory", "value": "Uses VS Code"},
                {"type": "field", "value": "orphan"},
                {"type": "field", "key": "memories", "value": "ignored"}
            ]
        }));

        let applied = agent
            .review(&exchange("I'm Ada and I use VS Code", "Nice to meet you"))
            .await
            .unwrap();

        assert_eq!(applied, 2);
        let profile = profiles.load().await;
        assert_eq!(profile.fields["name"], "Ada");
        assert_eq!(profile.memories, vec!["Uses VS Code".to_string()]);

        let request = &llm.recorded_calls()[0].messages;
        assert_eq!(request[0].role, crate::session::Role::User);
        assert!(request[0].content.contains("I'm Ada and I use VS Code"));
    }

    #[tokio::test]
    async fn test_no_update_requested() {
        let (_dir, llm, profiles, agent) = setup();
        llm.queue_structured(json!({"shouldUpdate": false, "updates": []}));

        assert_eq!(agent.review(&exchange("weather?", "sunny")).await.unwrap(), 0);
        assert_eq!(profiles.load().await, Default::default());
    }

    #[tokio::test]
    async fn test_skips_without_exchange() {
        let (_dir, llm, _profiles, agent) = setup();
        let transcript: Transcript = std::iter::once(Message::user("pending")).collect();

        assert_eq!(agent.review(&transcript).await.unwrap(), 0);
        assert!(llm.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let (_dir, _llm, _profiles, agent) = setup();
        assert!(matches!(
            agent.review(&exchange("hi", "hello")).await,
            Err(MemoryAgentError::Llm(_))
        ));
    }
}
