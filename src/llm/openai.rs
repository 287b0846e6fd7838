//! `OpenAI` Chat Completions client

use super::types::OutputSchema;
use super::{LlmError, LlmService};
use crate::session::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAIService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIService {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            model,
            base_url: API_URL.to_string(),
        }
    }

    fn build_request(&self, messages: &[Message], schema: Option<&OutputSchema>) -> OpenAIRequest {
        let messages = messages
            .iter()
            .map(|m| OpenAIMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect();

        let response_format = schema.map(|s| {
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": s.name,
                    "description": s.description,
                    "schema": s.schema,
                }
            })
        });

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            response_format,
        }
    }

    async fn send(&self, request: &OpenAIRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            return Err(LlmError::from_status(status, &message));
        }

        let parsed: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))
            .map(|choice| choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError> {
        let text = self.send(&self.build_request(messages, None)).await?;
        Ok(Message::assistant(text))
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        let text = self.send(&self.build_request(messages, Some(schema))).await?;
        serde_json::from_str(&text)
            .map_err(|e| LlmError::decode(format!("{} output is not JSON: {e}", schema.name)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_pass_through() {
        let service = OpenAIService::new("key".to_string(), "gpt-4o-mini".to_string());
        let request = service.build_request(&[Message::system("s"), Message::user("u")], None);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_structured_request_sets_json_schema() {
        let service = OpenAIService::new("key".to_string(), "gpt-4o-mini".to_string());
        let schema = OutputSchema::new("route", "decide", json!({"type": "object"}));
        let request = service.build_request(&[Message::user("u")], Some(&schema));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "route");
    }

    #[test]
    fn test_null_content_parses() {
        let response: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(response.choices[0].message.content.is_none());
    }
}
