//! Test doubles for the model, operations and capabilities

#![allow(clippy::missing_panics_doc)]

use super::traits::SessionStore;
use crate::capability::{Capability, CapabilityMetadata, Operation, OperationError};
use crate::config::Config;
use crate::llm::{LlmError, LlmService, OutputSchema};
use crate::session::{Message, SessionState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock LLM
// ============================================================================

/// One request seen by [`MockLlm`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    /// Schema name for structured calls
    pub schema: Option<String>,
}

impl RecordedCall {
    /// All message contents joined, for substring assertions
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Scripted model. Plain and structured replies come from separate queues so
/// interleaved turns still get well-typed answers.
pub struct MockLlm {
    /// Each reply carries an extra delay on top of `latency`
    text: Mutex<VecDeque<(Result<String, LlmError>, Duration)>>,
    structured: Mutex<VecDeque<Result<Value, LlmError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            text: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every reply by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn queue_text(&self, reply: impl Into<String>) {
        self.queue_text_delayed(reply, Duration::ZERO);
    }

    /// Text reply that arrives only after `delay`
    pub fn queue_text_delayed(&self, reply: impl Into<String>, delay: Duration) {
        self.text.lock().unwrap().push_back((Ok(reply.into()), delay));
    }

    pub fn queue_text_error(&self, error: LlmError) {
        self.text.lock().unwrap().push_back((Err(error), Duration::ZERO));
    }

    pub fn queue_structured(&self, reply: Value) {
        self.structured.lock().unwrap().push_back(Ok(reply));
    }

    pub fn queue_structured_error(&self, error: LlmError) {
        self.structured.lock().unwrap().push_back(Err(error));
    }

    /// Queue a router reply selecting `calls` as `(name, args-json)` pairs.
    pub fn queue_route(&self, calls: &[(&str, &str)]) {
        let tools: Vec<Value> = calls
            .iter()
            .map(|(name, args)| json!({"name": name, "args": args}))
            .collect();
        self.queue_structured(json!({"needsTools": !tools.is_empty(), "tools": tools}));
    }

    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, messages: &[Message], schema: Option<&OutputSchema>) {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            schema: schema.map(|s| s.name.clone()),
        });
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, LlmError> {
        self.record(messages, None);
        let (reply, delay) = self.text.lock().unwrap().pop_front().unwrap_or_else(|| {
            (
                Err(LlmError::network("No mock text reply queued")),
                Duration::ZERO,
            )
        });
        let delay = self.latency + delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply.map(Message::assistant)
    }

    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<Value, LlmError> {
        self.record(messages, Some(schema));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock structured reply queued")))
    }

    fn model_id(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Session store
// ============================================================================

/// Store whose saves always fail
pub struct FailingSessionStore {
    fail_loads: bool,
}

impl FailingSessionStore {
    /// Loads fail as well
    pub fn all() -> Self {
        Self { fail_loads: true }
    }

    /// Loads succeed and find nothing

    pub fn saves_only() -> Self {
        Self { fail_loads: false }
    }
}

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn load(&self, _key: &str) -> Result<Option<SessionState>, String> {
        if self.fail_loads {
            Err("disk unavailable".to_string())
        } else {
            Ok(None)
        }
    }

    async fn save(&self, _key: &str, _state: &SessionState) -> Result<(), String> {
        Err("disk full".to_string())
    }
}

// ============================================================================
// Operations
// ============================================================================

enum Behavior {
    Constant(String),
    Echo,
    Fail(String),
    Panic,
    Slow(Duration, String),
}

/// Scripted operation that counts its invocations
pub struct FnOperation {
    name: String,
    description: String,
    behavior: Behavior,
    invocations: AtomicUsize,
}

impl FnOperation {
    fn with_behavior(name: &str, description: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            behavior,
            invocations: AtomicUsize::new(0),
        }
    }

    /// Always returns `output`; the description doubles as the output.
    pub fn constant(name: &str, output: &str) -> Self {
        Self::with_behavior(name, output, Behavior::Constant(output.to_string()))
    }

    /// Returns its arguments as compact JSON
    pub fn echo(name: &str) -> Self {
        Self::with_behavior(name, "echo", Behavior::Echo)
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_behavior(name, "fails", Behavior::Fail(message.to_string()))
    }

    pub fn panicking(name: &str) -> Self {
        Self::with_behavior(name, "panics", Behavior::Panic)
    }

    pub fn slow(name: &str, delay: Duration, output: &str) -> Self {
        Self::with_behavior(name, output, Behavior::Slow(delay, output.to_string()))
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn argument_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn invoke(&self, args: Value) -> Result<String, OperationError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Constant(output) => Ok(output.clone()),
            Behavior::Echo => Ok(args.to_string()),
            Behavior::Fail(message) => Err(OperationError::failed(message.clone())),
            Behavior::Panic => panic!("operation {} blew up", self.name),
            Behavior::Slow(delay, output) => {
                tokio::time::sleep(*delay).await;
                Ok(output.clone())
            }
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

#[derive(Clone, Copy)]
enum Availability {
    Always,
    Never,
    WebSearch,
}

/// Capability assembled in tests
pub struct FakeCapability {
    metadata: CapabilityMetadata,
    instructions: Option<String>,
    operations: Vec<Arc<dyn Operation>>,
    availability: Availability,
}

impl FakeCapability {
    pub fn new(name: &str) -> Self {
        Self {
            metadata: CapabilityMetadata {
                name: name.to_string(),
                description: format!("{name} capability"),
                icon: "🧪".to_string(),
                version: "1.0.0".to_string(),
            },
            instructions: None,
            operations: Vec::new(),
            availability: Availability::Always,
        }
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_operation(mut self, operation: impl Operation + 'static) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.availability = Availability::Never;
        self
    }

    /// Available only when a web search key is configured
    pub fn requires_web_search(mut self) -> Self {
        self.availability = Availability::WebSearch;
        self
    }
}

impl Capability for FakeCapability {
    fn metadata(&self) -> &CapabilityMetadata {
        &self.metadata
    }

    fn is_available(&self, config: &Config) -> bool {
        match self.availability {
            Availability::Always => true,
            Availability::Never => false,
            Availability::WebSearch => config.integrations.web_search_enabled(),
        }
    }

    fn operations(&self, _config: &Config) -> Vec<Arc<dyn Operation>> {
        self.operations.clone()
    }

    fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}
