//! Common types for LLM interactions

use crate::session::{Message, Role};
use serde_json::Value;

/// Shape requested from a structured-output call
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for the object the model must produce
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

/// Messages split into a joined system prompt and the conversational turns.
///
/// Both providers we talk to want system text separate from (or ahead of)
/// the alternating user/assistant list.
pub(crate) struct SplitPrompt<'a> {
    pub system: String,
    pub turns: Vec<&'a Message>,
}

pub(crate) fn split_system(messages: &[Message]) -> SplitPrompt<'_> {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let turns = messages.iter().filter(|m| m.role != Role::System).collect();
    SplitPrompt { system, turns }
}
