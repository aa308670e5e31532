//! Effects produced by state transitions

use crate::state_machine::state::{ApprovalOutcome, Message, ToolCall};

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a message to the conversation log
    AppendMessage(Message),

    /// Record the outcome of a human-approval decision
    SetApproval(ApprovalOutcome),

    /// Write the conversation (log, approval field, turn state) to the checkpoint store
    Checkpoint,

    /// Ask the model to respond to the current history
    RequestModel,

    /// Run a search tool
    ExecuteTool { call: ToolCall },

    /// Notify connected clients
    Notify(Notification),

    /// End the turn with an error shown to the user
    ReportFailure { message: String },
}

/// Client-facing notifications that are not message appends
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ApprovalRequired {
        tool_call_id: String,
        question: String,
    },
    TurnDone,
}

impl Effect {
    pub fn append_user_message(text: impl Into<String>) -> Self {
        Effect::AppendMessage(Message::user(text))
    }

    pub fn append_tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Effect::AppendMessage(Message::tool_result(tool_call_id, content, is_error))
    }

    pub fn execute_tool(call: ToolCall) -> Self {
        Effect::ExecuteTool { call }
    }

    pub fn notify_turn_done() -> Self {
        Effect::Notify(Notification::TurnDone)
    }

    pub fn notify_approval_required(
        tool_call_id: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Effect::Notify(Notification::ApprovalRequired {
            tool_call_id: tool_call_id.into(),
            question: question.into(),
        })
    }

    pub fn report_failure(message: impl Into<String>) -> Self {
        Effect::ReportFailure {
            message: message.into(),
        }
    }
}
