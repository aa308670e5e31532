//! Runtime for driving turns
//!
//! Owns the effect loop around the pure state machine: loads a thread's
//! checkpoint, feeds events through `transition`, performs the resulting
//! effects and reports how the turn ended.

mod executor;
mod recovery;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::TurnController;
pub use traits::*;

use crate::state_machine::{Message, TransitionError};
use serde::Serialize;
use thiserror::Error;

/// Type alias for production controller with concrete implementations
pub type ProductionController =
    TurnController<std::sync::Arc<dyn CheckpointStore>, LlmServiceClient, ToolRegistryExecutor>;

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Message {
        message: Message,
    },
    ApprovalRequired {
        tool_call_id: String,
        question: String,
    },
    TurnDone,
    TurnFailed {
        message: String,
    },
}

/// How a turn stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced a final answer
    Done,
    /// Suspended on the approval question; resume with the operator's answer
    AwaitingApproval { question: String },
    /// Model failure or contract violation; the log is left as it was
    Failed { error: String },
}

/// Result of one `submit` or `resume` call
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub thread_id: String,
    #[serde(flatten)]
    pub status: TurnStatus,
    /// Messages appended during this call, in order
    pub messages: Vec<Message>,
}

/// Reasons a turn could not run at all
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Thread {0} already has a turn running")]
    ThreadBusy(String),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Checkpoint storage failed: {0}")]
    Storage(String),
}
