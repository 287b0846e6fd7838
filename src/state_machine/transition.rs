//! Pure state transition function

use super::{Effect, Event, Topology, TurnPhase};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub next: TurnPhase,
    pub effect: Effect,
}

impl TransitionResult {
    fn new(next: TurnPhase, effect: Effect) -> Self {
        Self { next, effect }
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {event:?} in phase {phase}")]
    InvalidTransition { phase: &'static str, event: Event },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    phase: TurnPhase,
    event: Event,
    topology: Topology,
) -> Result<TransitionResult, TransitionError> {
    match (phase, event) {
        (TurnPhase::Routing { cycle }, Event::Routed { needs_operations: true }) => Ok(
            TransitionResult::new(TurnPhase::Executing { cycle }, Effect::ExecuteOperations),
        ),

        (TurnPhase::Routing { .. }, Event::Routed { needs_operations: false }) => Ok(
            TransitionResult::new(
                TurnPhase::Generating {
                    step_cap_reached: false,
                },
                Effect::RequestGeneration,
            ),
        ),

        (TurnPhase::Executing { cycle }, Event::Executed) => {
            let completed = cycle + 1;
            match topology {
                Topology::SinglePass => Ok(TransitionResult::new(
                    TurnPhase::Generating {
                        step_cap_reached: false,
                    },
                    Effect::RequestGeneration,
                )),
                Topology::Chained { max_cycles } if completed >= max_cycles => {
                    Ok(TransitionResult::new(
                        TurnPhase::Generating {
                            step_cap_reached: true,
                        },
                        Effect::RequestGeneration,
                    ))
                }
                Topology::Chained { .. } => Ok(TransitionResult::new(
                    TurnPhase::Routing { cycle: completed },
                    Effect::RequestRoute,
                )),
            }
        }

        (TurnPhase::Generating { .. }, Event::Generated) => {
            Ok(TransitionResult::new(TurnPhase::Done, Effect::Complete))
        }

        (phase, event) => Err(TransitionError::InvalidTransition {
            phase: phase.name(),
            event,
        }),
    }
}
