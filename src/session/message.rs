//! Conversation messages and the ordered transcript

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message with a stable identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompactionError {
    #[error("cannot compact an empty prefix")]
    EmptyPrefix,
    #[error("prefix of {prefix} messages exceeds transcript length {len}")]
    PrefixTooLong { prefix: usize, len: usize },
    #[error("summary id {0} collides with a retained message")]
    DuplicateId(String),
}

/// Ordered message history.
///
/// Append-only; the one exception is [`Transcript::compact`], which swaps a
/// contiguous prefix for a single summary message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.0.iter().filter(|m| m.role == role).count()
    }

    /// The trailing user/assistant pair, if the transcript ends with one.
    pub fn last_exchange(&self) -> Option<(&Message, &Message)> {
        match self.0.as_slice() {
            [.., user, assistant]
                if user.role == Role::User && assistant.role == Role::Assistant =>
            {
                Some((user, assistant))
            }
            _ => None,
        }
    }

    /// Replace the first `prefix_len` messages with `summary`.
    ///
    /// Order of the retained messages is preserved and identities stay unique.
    /// Returns the removed messages.
    pub fn compact(
        &mut self,
        prefix_len: usize,
        summary: Message,
    ) -> Result<Vec<Message>, CompactionError> {
        if prefix_len == 0 {
            return Err(CompactionError::EmptyPrefix);
        }
        if prefix_len > self.0.len() {
            return Err(CompactionError::PrefixTooLong {
                prefix: prefix_len,
                len: self.0.len(),
            });
        }

        let retained: HashSet<&str> = self.0[prefix_len..].iter().map(|m| m.id.as_str()).collect();
        if retained.contains(summary.id.as_str()) {
            return Err(CompactionError::DuplicateId(summary.id));
        }

        let removed: Vec<Message> = self
            .0
            .splice(..prefix_len, std::iter::once(summary))
            .collect();
        Ok(removed)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Message> for Transcript {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
