//! Concurrent operation execution

use crate::capability::OperationSet;
use crate::session::{OperationCall, OperationResults};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs the selected operations for one routing cycle.
///
/// Every call yields exactly one result keyed `<name>_<ordinal>`; unknown
/// names, failures and panics become error strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationExecutor;

impl OperationExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute `calls` concurrently. `first_ordinal` offsets the result keys
    /// so later cycles of a turn do not overwrite earlier results.
    pub async fn execute(
        &self,
        calls: &[OperationCall],
        operations: &OperationSet,
        first_ordinal: usize,
    ) -> OperationResults {
        let tasks = calls.iter().enumerate().map(|(index, call)| {
            let key = format!("{}_{}", call.name, first_ordinal + index);
            let operation = operations.get(&call.name).map(Arc::clone);
            let args = Value::Object(call.args.clone());
            let name = call.name.clone();
            async move {
                let Some(operation) = operation else {
                    tracing::warn!(operation = %name, "Operation not found");
                    return (key, format!("Tool \"{name}\" not found"));
                };

                // Detached so an abandoned turn does not cancel the operation
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = operation.invoke(args).await;
                    (result, started.elapsed())
                });

                let value = match handle.await {
                    Ok((Ok(output), elapsed)) => {
                        log_outcome(&name, elapsed, None);
                        output
                    }
                    Ok((Err(e), elapsed)) => {
                        let message = e.to_string();
                        log_outcome(&name, elapsed, Some(&message));
                        format!("Error: {message}")
                    }
                    Err(e) if e.is_panic() => {
                        tracing::error!(operation = %name, "Operation panicked");
                        "Error: operation panicked".to_string()
                    }
                    Err(e) => {
                        tracing::error!(operation = %name, error = %e, "Operation task failed");
                        "Error: operation was cancelled".to_string()
                    }
                };
                (key, value)
            }
        });

        join_all(tasks).await.into_iter().collect()
    }
}

fn log_outcome(name: &str, elapsed: Duration, error: Option<&str>) {
    match error {
        None => tracing::info!(
            operation = %name,
            duration_ms = %elapsed.as_millis(),
            "Operation completed"
        ),
        Some(error) => tracing::warn!(
            operation = %name,
            duration_ms = %elapsed.as_millis(),
            error,
            "Operation failed"
        ),
    }
}
