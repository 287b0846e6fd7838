//! Response synthesis

use crate::llm::{LlmError, LlmService};
use crate::session::{Message, SessionState};
use crate::system_prompt::{results_for_generator, GENERATOR_PROMPT};
use std::sync::Arc;

pub struct Generator {
    llm: Arc<dyn LlmService>,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    fn prompt(state: &SessionState) -> Vec<Message> {
        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(Message::system(GENERATOR_PROMPT));
        messages.extend(state.messages.iter().cloned());
        if !state.operation_results.is_empty() {
            messages.push(Message::system(results_for_generator(
                &state.operation_results,
            )));
        }
        messages
    }

    /// Produce the assistant reply for the current turn. The caller records
    /// it on the session.
    pub async fn generate(&self, state: &SessionState) -> Result<String, LlmError> {
        let reply = self.llm.invoke(&Self::prompt(state)).await?;
        Ok(reply.content)
    }
}
