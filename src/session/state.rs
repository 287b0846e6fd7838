//! Session state and the turn-scoped routing data it carries

use super::message::{Message, Transcript};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One operation invocation chosen by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl OperationCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Router output for one routing step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub needs_operations: bool,
    pub calls: Vec<OperationCall>,
}

impl RoutingDecision {
    /// Answer directly, no operations.
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn with_calls(calls: Vec<OperationCall>) -> Self {
        Self {
            needs_operations: !calls.is_empty(),
            calls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub key: String,
    pub value: String,
}

/// Result mapping keyed by `<name>_<ordinal>`.
///
/// Keeps first-insertion order so prompts are deterministic. Merging replaces
/// values for existing keys in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationResults(Vec<OperationResult>);

impl OperationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.0.iter_mut().find(|r| r.key == key) {
            existing.value = value;
        } else {
            self.0.push(OperationResult { key, value });
        }
    }

    pub fn merge(&mut self, other: OperationResults) {
        for OperationResult { key, value } in other.0 {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(String, String)> for OperationResults {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut results = Self::new();
        for (key, value) in iter {
            results.insert(key, value);
        }
        results
    }
}

/// State threaded through one turn and persisted between turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub messages: Transcript,
    #[serde(default)]
    pub selected_operations: Vec<OperationCall>,
    #[serde(default)]
    pub operation_results: OperationResults,
    #[serde(default)]
    pub needs_operations: bool,
    #[serde(default)]
    pub response: String,
}

impl SessionState {
    /// Start a turn: clear turn-scoped fields and append the user message.
    pub fn begin_turn(&mut self, text: impl Into<String>) {
        self.selected_operations.clear();
        self.operation_results.clear();
        self.needs_operations = false;
        self.response.clear();
        self.messages.push(Message::user(text));
    }

    /// Record a routing decision.
    ///
    /// `needs_operations` is forced to false when no calls were selected, so
    /// the executor never sees an empty positive decision.
    pub fn apply_decision(&mut self, decision: RoutingDecision) {
        self.needs_operations = decision.needs_operations && !decision.calls.is_empty();
        self.selected_operations = if self.needs_operations {
            decision.calls
        } else {
            Vec::new()
        };
    }

    pub fn merge_results(&mut self, results: OperationResults) {
        self.operation_results.merge(results);
    }

    /// Append the generated answer and make it authoritative.
    pub fn record_response(&mut self, response: impl Into<String>) {
        let response = response.into();
        self.messages.push(Message::assistant(response.clone()));
        self.response = response;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use serde_json::json;

    fn call(name: &str) -> OperationCall {
        OperationCall::new(name, Map::new())
    }

    #[test]
    fn test_begin_turn_resets_turn_fields() {
        let mut state = SessionState::default();
        state.begin_turn("first");
        state.apply_decision(RoutingDecision::with_calls(vec![call("calculator")]));
        state.merge_results([("calculator_0".to_string(), "Result: 4".to_string())].into_iter().collect());
        state.record_response("4");

        state.begin_turn("second");

        assert!(state.selected_operations.is_empty());
        assert!(state.operation_results.is_empty());
        assert!(!state.needs_operations);
        assert!(state.response.is_empty());
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_empty_positive_decision_is_overridden() {
        let mut state = SessionState::default();
        state.apply_decision(RoutingDecision {
            needs_operations: true,
            calls: vec![],
        });
        assert!(!state.needs_operations);
        assert!(state.selected_operations.is_empty());
    }

    #[test]
    fn test_negative_decision_drops_calls() {
        let mut state = SessionState::default();
        state.apply_decision(RoutingDecision {
            needs_operations: false,
            calls: vec![call("calculator")],
        });
        assert!(state.selected_operations.is_empty());
    }

    #[test]
    fn test_results_merge_keeps_order_and_overwrites() {
        let mut results = OperationResults::new();
        results.insert("a_0", "1");
        results.insert("b_1", "2");

        let mut more = OperationResults::new();
        more.insert("a_0", "3");
        more.insert("c_0", "4");
        results.merge(more);

        let keys: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a_0", "b_1", "c_0"]);
        assert_eq!(results.get("a_0"), Some("3"));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let mut state = SessionState::default();
        state.begin_turn("hi");
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("selectedOperations").is_some());
        assert!(value.get("needsOperations").is_some());
        assert_eq!(value["messages"][0]["content"], json!("hi"));

        let back: SessionState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }
}
