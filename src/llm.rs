//! LLM provider abstraction
//!
//! Router, generator, compactor and memory agent all talk to the model
//! through [`LlmService`]; providers only translate messages to their wire
//! format.

mod anthropic;
mod error;
mod openai;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAIService;
pub use types::OutputSchema;

use crate::config::{LlmConfig, LlmProvider};
use crate::session::Message;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Plain completion; returns the assistant message
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError>;

    /// Completion constrained to `schema`; returns the raw JSON object
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LlmService + ?Sized> LlmService for Arc<T> {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError> {
        (**self).invoke(messages).await
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        (**self).invoke_structured(messages, schema).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Structured call decoded into `T`.
///
/// Output that parses as JSON but does not fit `T` is a decode error.
pub async fn invoke_typed<T: DeserializeOwned>(
    llm: &dyn LlmService,
    messages: &[Message],
    schema: &OutputSchema,
) -> Result<T, LlmError> {
    let value = llm.invoke_structured(messages, schema).await?;
    serde_json::from_value(value)
        .map_err(|e| LlmError::decode(format!("{} output does not match schema: {e}", schema.name)))
}

/// Build the configured provider, wrapped in [`LoggingService`].
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmService>, LlmError> {
    let inner: Arc<dyn LlmService> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAIService::new(
            config.openai_api_key.clone().unwrap_or_default(),
            config.model.clone(),
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicService::new(
            config.anthropic_api_key.clone().unwrap_or_default(),
            config.model.clone(),
        )),
        LlmProvider::Google => {
            return Err(LlmError::invalid_request(
                "provider 'google' has no client in this build",
            ))
        }
    };
    Ok(Arc::new(LoggingService::new(inner)))
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }

    fn log<T>(&self, call: &str, started: std::time::Instant, result: &Result<T, LlmError>) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    call,
                    duration_ms = %duration.as_millis(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    call,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.invoke(messages).await;
        self.log("invoke", start, &result);
        result
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.invoke_structured(messages, schema).await;
        self.log(&schema.name, start, &result);
        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
