//! Anthropic Messages API client

use super::types::{split_system, OutputSchema};
use super::{LlmError, LlmService};
use crate::session::{Message, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicService {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicService {
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

    fn build_request(&self, messages: &[Message], schema: Option<&OutputSchema>) -> AnthropicRequest {
        let mut split = split_system(messages);
        let mut messages: Vec<AnthropicMessage> = split
            .turns
            .iter()
            .map(|m| AnthropicMessage {
                role: if m.role == Role::Assistant {
                    "assistant"
                } else {
                    "user"
                },
                content: m.content.clone(),
            })
            .collect();

        // The API rejects an empty message list; a system-only prompt is
        // sent as the user turn instead.
        if messages.is_empty() {
            messages.push(AnthropicMessage {
                role: "user",
                content: std::mem::take(&mut split.system),
            });
        }

        // Structured output is a forced call to a single tool whose input
        // schema is the requested shape.
        let (tools, tool_choice) = match schema {
            Some(s) => (
                Some(vec![AnthropicTool {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    input_schema: s.schema.clone(),
                }]),
                Some(ToolChoice {
                    r#type: "tool",
                    name: s.name.clone(),
                }),
            ),
            None => (None, None),
        };

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: (!split.system.is_empty()).then_some(split.system),
            messages,
            tools,
            tool_choice,
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
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
            return Err(LlmError::from_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e} - body: {body}")))
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError> {
        let response = self.send(&self.build_request(messages, None)).await?;
        Ok(Message::assistant(response.text()))
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        let response = self.send(&self.build_request(messages, Some(schema))).await?;
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { name, input } if name == schema.name => Some(input),
                _ => None,
            })
            .ok_or_else(|| LlmError::decode(format!("model did not call {}", schema.name)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    r#type: &'static str,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> AnthropicService {
        AnthropicService::new("key".to_string(), "claude-3-haiku-20240307".to_string())
    }

    #[test]
    fn test_system_messages_are_lifted() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let request = service().build_request(&messages, None);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["system"], "be brief");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_structured_request_forces_tool() {
        let schema = OutputSchema::new("route", "decide", json!({"type": "object"}));
        let request = service().build_request(&[Message::user("hi")], Some(&schema));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["tool_choice"], json!({"type": "tool", "name": "route"}));
        assert_eq!(value["tools"][0]["input_schema"], json!({"type": "object"}));
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_system_only_prompt_becomes_user_turn() {
        let request = service().build_request(&[Message::system("summarize this")], None);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["messages"],
            json!([{"role": "user", "content": "summarize this"}])
        );
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_response_parsing_skips_unknown_blocks() {
        let body = json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"},
            ],
            "stop_reason": "end_turn"
        });
        let response: AnthropicResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.text(), "ab");
    }
}
