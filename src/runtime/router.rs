//! Routing step: decide whether and which operations to run

use crate::capability::RegistrySnapshot;
use crate::llm::{invoke_typed, LlmService, OutputSchema};
use crate::session::{Message, OperationCall, RoutingDecision, SessionState};
use crate::system_prompt::{build_router_prompt, results_for_router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Raw structured reply from the model
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterOutput {
    needs_tools: bool,
    #[serde(default)]
    tools: Vec<RawCall>,
}

#[derive(Debug, Deserialize)]
struct RawCall {
    name: String,
    /// Normally a JSON string; objects are accepted as-is
    #[serde(default)]
    args: Value,
}

fn router_schema() -> OutputSchema {
    OutputSchema::new(
        "route_request",
        "Decide whether tools are needed to answer the user, and which ones",
        json!({
            "type": "object",
            "properties": {
                "needsTools": {
                    "type": "boolean",
                    "description": "Whether tools are needed to answer the query"
                },
                "tools": {
                    "type": "array",
                    "description": "List of tools to use with their arguments",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string", "description": "Name of the tool to use"},
                            "args": {
                                "type": "string",
                                "description": "JSON string of arguments for the tool, e.g. \"{\\\"expression\\\": \\\"2 + 2\\\"}\""
                            }
                        },
                        "required": ["name", "args"]
                    }
                }
            },
            "required": ["needsTools", "tools"]
        }),
    )
}

/// Decode one argument payload. Anything that is not an object, or a
/// string holding one, becomes an empty map.
fn decode_args(operation: &str, raw: Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == "{}" {
                return Map::new();
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    tracing::error!(operation, args = %other, "Router args are not a JSON object");
                    Map::new()
                }
                Err(e) => {
                    tracing::error!(operation, args = %text, error = %e, "Failed to parse router args");
                    Map::new()
                }
            }
        }
        other => {
            tracing::error!(operation, args = %other, "Router args are not a JSON object");
            Map::new()
        }
    }
}

fn interpret(output: RouterOutput) -> RoutingDecision {
    let calls: Vec<OperationCall> = output
        .tools
        .into_iter()
        .map(|raw| {
            let args = decode_args(&raw.name, raw.args);
            OperationCall::new(raw.name, args)
        })
        .collect();
    RoutingDecision {
        needs_operations: output.needs_tools,
        calls,
    }
}

pub struct Router {
    llm: Arc<dyn LlmService>,
    schema: OutputSchema,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            schema: router_schema(),
        }
    }

    fn prompt(state: &SessionState, snapshot: &RegistrySnapshot) -> Vec<Message> {
        let mut messages = Vec::with_capacity(state.messages.len() + 2);
        messages.push(Message::system(build_router_prompt(
            &snapshot.operations,
            &snapshot.index,
            &snapshot.instructions,
        )));
        messages.extend(state.messages.iter().cloned());
        if !state.operation_results.is_empty() {
            messages.push(Message::system(results_for_router(&state.operation_results)));
        }
        messages
    }

    /// One routing decision. Never fails: model or decode errors fall back
    /// to a direct answer.
    pub async fn route(&self, state: &SessionState, snapshot: &RegistrySnapshot) -> RoutingDecision {
        let messages = Self::prompt(state, snapshot);
        match invoke_typed::<RouterOutput>(self.llm.as_ref(), &messages, &self.schema).await {
            Ok(output) => {
                let decision = interpret(output);
                tracing::info!(
                    needs_operations = decision.needs_operations,
                    operations = ?decision.calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "Routing decision"
                );
                decision
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind, "Router failed, answering directly");
                RoutingDecision::direct()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::config::test_config;
    use crate::llm::LlmError;
    use crate::runtime::testing::{FakeCapability, FnOperation, MockLlm};

    fn snapshot() -> RegistrySnapshot {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(
            FakeCapability::new("math")
                .with_operation(FnOperation::constant("calculator", "Evaluate math"))
                .with_instructions("Prefer the calculator for arithmetic."),
        ));
        Arc::new(registry).snapshot(&Arc::new(test_config()))
    }

    fn state(text: &str) -> SessionState {
        let mut state = SessionState::default();
        state.begin_turn(text);
        state
    }

    #[test]
    fn test_decode_args_variants() {
        assert!(decode_args("x", json!("")).is_empty());
        assert!(decode_args("x", json!("  {} ")).is_empty());
        assert!(decode_args("x", json!("{not json")).is_empty());
        assert!(decode_args("x", json!("[1, 2]")).is_empty());
        assert!(decode_args("x", json!(42)).is_empty());
        assert!(decode_args("x", Value::Null).is_empty());

        let parsed = decode_args("x", json!(r#"{"expression": "2+2"}"#));
        assert_eq!(parsed["expression"], "2+2");

        let object = decode_args("x", json!({"timezone": "Tokyo"}));
        assert_eq!(object["timezone"], "Tokyo");
    }

    #[test]
    fn test_interpret_keeps_order_and_flag() {
        let output: RouterOutput = serde_json::from_value(json!({
            "needsTools": true,
            "tools": [
                {"name": "calculator", "args": "{\"expression\": \"1+1\"}"},
                {"name": "get_datetime", "args": "{}"}
            ]
        }))
        .unwrap();
        let decision = interpret(output);

        assert!(decision.needs_operations);
        assert_eq!(decision.calls.len(), 2);
        assert_eq!(decision.calls[0].name, "calculator");
        assert_eq!(decision.calls[0].args["expression"], "1+1");
        assert!(decision.calls[1].args.is_empty());
    }

    #[tokio::test]
    async fn test_route_prompt_and_decision() {
        let llm = Arc::new(MockLlm::new());
        llm.queue_route(&[("calculator", r#"{"expression":"2+2"}"#)]);
        let router = Router::new(llm.clone());

        let decision = router.route(&state("what is 2+2?"), &snapshot()).await;

        assert!(decision.needs_operations);
        assert_eq!(decision.calls[0].args["expression"], "2+2");

        let calls = llm.recorded_calls();
        assert_eq!(calls[0].schema.as_deref(), Some("route_request"));
        let system = &calls[0].messages[0].content;
        assert!(system.contains("- calculator: Evaluate math"));
        assert!(system.contains("- read_skill:"));
        assert!(system.contains("Prefer the calculator for arithmetic."));
        assert_eq!(calls[0].messages.last().unwrap().content, "what is 2+2?");
    }

    #[tokio::test]
    async fn test_route_includes_results_so_far() {
        let llm = Arc::new(MockLlm::new());
        llm.queue_route(&[]);
        let router = Router::new(llm.clone());
        let mut state = state("what is 2+2?");
        state.operation_results.insert("calculator_0", "Result: 4");

        let decision = router.route(&state, &snapshot()).await;

        assert!(!decision.needs_operations);
        let last = llm.recorded_calls()[0].messages.last().unwrap().clone();
        assert!(last.content.contains("[calculator_0]: Result: 4"));
    }

    #[tokio::test]
    async fn test_route_fails_open() {
        let llm = Arc::new(MockLlm::new());
        llm.queue_structured_error(LlmError::server_error("boom"));
        llm.queue_structured(json!({"tools": "nonsense"}));
        let router = Router::new(llm.clone());

        assert_eq!(router.route(&state("hi"), &snapshot()).await, RoutingDecision::direct());
        assert_eq!(router.route(&state("hi"), &snapshot()).await, RoutingDecision::direct());
    }
}
