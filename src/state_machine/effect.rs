//! Effects produced by state transitions

/// Work the orchestrator must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Ask the router for the next decision
    RequestRoute,
    /// Run the currently selected operations
    ExecuteOperations,
    /// Ask the generator for the final response
    RequestGeneration,
    /// Turn is finished; persist and reply
    Complete,
}
