//! Transcript compaction: summarize old messages into one system message

use crate::llm::{LlmError, LlmService};
use crate::session::{CompactionError, Message, Role, Transcript};
use crate::system_prompt::build_summary_prompt;
use std::sync::Arc;
use thiserror::Error;

/// When to compact and how much to keep verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub max_user_messages: usize,
    pub max_assistant_messages: usize,
    /// Trailing messages never summarized
    pub keep_recent: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            max_user_messages: 5,
            max_assistant_messages: 5,
            keep_recent: 2,
        }
    }
}

impl CompactionPolicy {
    pub fn should_compact(&self, transcript: &Transcript) -> bool {
        transcript.count_role(Role::User) > self.max_user_messages
            || transcript.count_role(Role::Assistant) > self.max_assistant_messages
    }
}

#[derive(Debug, Error)]
pub enum CompactorError {
    #[error("summary request failed: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Compaction(#[from] CompactionError),
}

pub struct Compactor {
    llm: Arc<dyn LlmService>,
    policy: CompactionPolicy,
}

impl Compactor {
    pub fn new(llm: Arc<dyn LlmService>, policy: CompactionPolicy) -> Self {
        Self { llm, policy }
    }

    /// Compact `transcript` in place when the policy says so.
    ///
    /// Returns the number of messages folded into the summary.
    pub async fn compact(&self, transcript: &mut Transcript) -> Result<usize, CompactorError> {
        if !self.policy.should_compact(transcript) {
            return Ok(0);
        }
        let prefix_len = transcript.len().saturating_sub(self.policy.keep_recent);
        if prefix_len == 0 {
            return Ok(0);
        }

        let prefix = transcript.as_slice().get(..prefix_len).unwrap_or_default();
        let prompt = build_summary_prompt(prefix);
        let summary = self.llm.invoke(&[Message::user(prompt)]).await?;

        let removed = transcript.compact(
            prefix_len,
            Message::system(format!("Conversation Summary: {}", summary.content)),
        )?;
        tracing::info!(
            summarized = removed.len(),
            remaining = transcript.len(),
            "Compacted conversation"
        );
        Ok(removed.len())
    }
}
