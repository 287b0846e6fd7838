//! Per-conversation state threaded through a turn
//!
//! A session is identified by an opaque key chosen by the caller. Only the
//! transcript survives between turns; everything else is turn-scoped.

mod message;
mod state;

pub use message::{CompactionError, Message, Role, Transcript};
pub use state::{OperationCall, OperationResults, RoutingDecision, SessionState};
