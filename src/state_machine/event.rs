//! Events that can occur in a conversation

use crate::llm::{LlmError, LlmResponse};
use crate::state_machine::state::ToolCallRequest;
use crate::tools::ToolOutput;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },
    ApprovalAnswer {
        answer: String,
    },

    // Model events
    ModelResponse {
        text: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    ModelError {
        message: String,
    },

    // Tool events
    ToolComplete {
        tool_call_id: String,
        output: ToolOutput,
    },
}

impl Event {
    pub fn from_llm_response(response: &LlmResponse) -> Self {
        let tool_calls = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| ToolCallRequest::new(id, name, input.clone()))
            .collect();

        Event::ModelResponse {
            text: response.text(),
            tool_calls,
        }
    }

    pub fn from_llm_error(error: &LlmError) -> Self {
        Event::ModelError {
            message: error.message.clone(),
        }
    }
}
