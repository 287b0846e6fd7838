//! Turn orchestration
//!
//! [`Orchestrator::chat`] drives one turn through the state machine:
//! route, optionally execute (possibly several cycles), generate. Turns on
//! the same session key are serialized; distinct keys run concurrently.

mod compactor;
mod executor;
mod generator;
mod memory_agent;
mod router;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use compactor::{CompactionPolicy, Compactor};
pub use executor::OperationExecutor;
pub use generator::Generator;
pub use memory_agent::MemoryAgent;
pub use router::Router;
pub use traits::*;

use crate::capability::{CapabilityRegistry, CapabilitySummary, RegistrySnapshot};
use crate::config::{RuntimeConfig, SharedConfig};
use crate::llm::{LlmError, LlmService};
use crate::session::SessionState;
use crate::skills::ProfileStore;
use crate::state_machine::{transition, Effect, Event, TransitionError, TurnPhase};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Reasons a turn produced no response. The session is left as it was
/// before the turn in every case.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("turn exceeded the {0:?} timeout")]
    Timeout(Duration),
    #[error("response generation failed: {0}")]
    Generation(#[source] LlmError),
    #[error("session store error: {0}")]
    Store(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Owns the per-turn components and the per-session locks
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    config: SharedConfig,
    settings: RuntimeConfig,
    store: Arc<dyn SessionStore>,
    router: Router,
    executor: OperationExecutor,
    generator: Generator,
    compactor: Option<Compactor>,
    memory_agent: Option<Arc<MemoryAgent>>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmService>,
        registry: Arc<CapabilityRegistry>,
        config: SharedConfig,
        settings: RuntimeConfig,
        store: Arc<dyn SessionStore>,
        profiles: Arc<ProfileStore>,
    ) -> Self {
        let compactor = settings
            .compaction
            .map(|policy| Compactor::new(Arc::clone(&llm), policy));
        let memory_agent = settings
            .memory_agent
            .then(|| Arc::new(MemoryAgent::new(Arc::clone(&llm), profiles)));
        Self {
            registry,
            config,
            settings,
            store,
            router: Router::new(Arc::clone(&llm)),
            executor: OperationExecutor::new(),
            generator: Generator::new(llm),
            compactor,
            memory_agent,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Capability index under the current configuration
    pub async fn capabilities(&self) -> Vec<CapabilitySummary> {
        let config = self.config.read().await;
        self.registry.capability_index(&config)
    }

    /// Stored state for `key`, without taking the turn lock
    pub async fn session(&self, key: &str) -> Result<Option<SessionState>, TurnError> {
        self.store.load(key).await.map_err(TurnError::Store)
    }

    /// Allocate a fresh session key and persist an empty session under it
    pub async fn create_session(&self) -> Result<String, TurnError> {
        let key = uuid::Uuid::new_v4().to_string();
        self.store
            .save(&key, &SessionState::default())
            .await
            .map_err(TurnError::Store)?;
        tracing::info!(session = %key, "Created session");
        Ok(key)
    }

    async fn session_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Drop the map entry for `key` unless another turn is holding or
    /// waiting on it. Clones are only taken under the map lock, so a count
    /// of two (map plus `lock`) cannot race with a new waiter.
    async fn release_lock(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        if Arc::strong_count(lock) == 2 {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.session_locks.lock().await.len()
    }

    /// Run one turn for `key` and return the assistant response.
    pub async fn chat(&self, key: &str, text: &str) -> Result<String, TurnError> {
        let lock = self.session_lock(key).await;
        let result = {
            let _turn = lock.lock().await;
            self.locked_turn(key, text).await
        };
        self.release_lock(key, &lock).await;
        result
    }

    async fn locked_turn(&self, key: &str, text: &str) -> Result<String, TurnError> {
        let started = Instant::now();

        let mut state = self
            .store
            .load(key)
            .await
            .map_err(TurnError::Store)?
            .unwrap_or_default();
        state.begin_turn(text);

        let config = Arc::new(self.config.read().await.clone());
        let snapshot = self.registry.snapshot(&config);

        let timeout = self.settings.turn_timeout;
        match tokio::time::timeout(timeout, self.run_turn(&mut state, &snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(session = %key, error = %e, "Turn failed");
                return Err(e);
            }
            Err(_) => {
                tracing::error!(session = %key, timeout_ms = %timeout.as_millis(), "Turn timed out");
                return Err(TurnError::Timeout(timeout));
            }
        }

        // The answer is ready; compaction may only use what is left of the
        // turn budget and never turns a completed turn into a failure.
        if let Some(compactor) = &self.compactor {
            let remaining = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, compactor.compact(&mut state.messages)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(session = %key, error = %e, "Compaction failed, keeping full transcript");
                }
                Err(_) => {
                    tracing::warn!(session = %key, "Compaction ran out of turn time, keeping full transcript");
                }
            }
        }

        self.store
            .save(key, &state)
            .await
            .map_err(TurnError::Store)?;

        tracing::info!(
            session = %key,
            operations = state.operation_results.len(),
            messages = state.messages.len(),
            duration_ms = %started.elapsed().as_millis(),
            "Turn completed"
        );

        if let Some(agent) = &self.memory_agent {
            let agent = Arc::clone(agent);
            let transcript = state.messages.clone();
            let session = key.to_string();
            tokio::spawn(async move {
                match agent.review(&transcript).await {
                    Ok(0) => {}
                    Ok(applied) => tracing::info!(session = %session, applied, "Memory agent updated profile"),
                    Err(e) => tracing::warn!(session = %session, error = %e, "Memory agent failed"),
                }
            });
        }

        Ok(state.response)
    }

    async fn run_turn(
        &self,
        state: &mut SessionState,
        snapshot: &RegistrySnapshot,
    ) -> Result<(), TurnError> {
        let topology = self.settings.topology;
        let mut phase = TurnPhase::initial();
        let mut effect = Effect::RequestRoute;

        loop {
            let event = match effect {
                Effect::RequestRoute => {
                    let decision = self.router.route(state, snapshot).await;
                    state.apply_decision(decision);
                    Event::Routed {
                        needs_operations: state.needs_operations,
                    }
                }
                Effect::ExecuteOperations => {
                    let first_ordinal = state.operation_results.len();
                    let results = self
                        .executor
                        .execute(&state.selected_operations, &snapshot.operations, first_ordinal)
                        .await;
                    state.merge_results(results);
                    Event::Executed
                }
                Effect::RequestGeneration => {
                    if matches!(phase, TurnPhase::Generating { step_cap_reached: true }) {
                        tracing::warn!(
                            results = state.operation_results.len(),
                            "Routing cycle cap reached, generating from partial results"
                        );
                    }
                    let response = self
                        .generator
                        .generate(state)
                        .await
                        .map_err(TurnError::Generation)?;
                    state.record_response(response);
                    Event::Generated
                }
                Effect::Complete => break,
            };

            let next = transition(phase, event, topology)?;
            tracing::debug!(from = phase.name(), to = next.next.name(), "Turn transition");
            phase = next.next;
            effect = next.effect;
        }
        Ok(())
    }
}
