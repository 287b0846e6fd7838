//! Turn state machine
//!
//! One turn is route → (execute → route)* → generate. Transitions are a pure
//! function of phase, event and topology; the orchestrator performs the
//! effects and feeds the outcomes back in as events.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Topology, TurnPhase};
pub use transition::{transition, TransitionError};
