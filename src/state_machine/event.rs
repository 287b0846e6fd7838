//! Outcomes reported back to the state machine

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Router finished; `needs_operations` is the effective decision
    /// (already false when nothing was selected)
    Routed { needs_operations: bool },
    /// Executor merged results for every selected operation
    Executed,
    /// Generator produced the response
    Generated,
}
