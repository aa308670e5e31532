//! API request and response types

use crate::state_machine::{ApprovalOutcome, Message, ThreadSummary};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/threads/:id/messages`
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: String,
}

/// Body of `POST /api/threads/:id/approval`
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub answer: String,
}

/// Response for thread listing
#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    pub threads: Vec<ThreadSummary>,
}

/// Full view of one thread
#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: String,
    pub messages: Vec<Message>,
    /// Label of the current turn state
    pub turn: &'static str,
    /// Question awaiting an operator answer, if the turn is suspended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub approval: Option<ApprovalOutcome>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
