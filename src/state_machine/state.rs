//! Turn phases and the post-execution topology

/// What happens after the executor finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Execute once, then generate
    SinglePass,
    /// Route again after every execution, up to `max_cycles` executions
    Chained { max_cycles: usize },
}

/// Phase of a turn in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting on the router. `cycle` counts completed executions.
    Routing { cycle: usize },
    Executing { cycle: usize },
    /// `step_cap_reached` is set when the chain was cut off rather than the
    /// router deciding it was finished.
    Generating { step_cap_reached: bool },
    Done,
}

impl TurnPhase {
    pub fn initial() -> Self {
        TurnPhase::Routing { cycle: 0 }
    }

    pub fn name(self) -> &'static str {
        match self {
            TurnPhase::Routing { .. } => "routing",
            TurnPhase::Executing { .. } => "executing",
            TurnPhase::Generating { .. } => "generating",
            TurnPhase::Done => "done",
        }
    }
}
