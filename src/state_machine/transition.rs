//! Pure state transition function
//!
//! Given the current turn state and an event, decides the next state and the
//! effects the runtime must carry out. No I/O happens here.

use super::state::{ApprovalOutcome, Message, ToolCall, ToolCallRequest, ToolKind, TurnState};
use super::state::APPROVAL_QUESTION;
use super::{Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events the current state refuses
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("A turn is already in progress on this thread")]
    TurnInProgress,
    #[error("Waiting for an answer to the approval question")]
    ApprovalPending,
    #[error("No approval question is pending")]
    NoApprovalPending,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(state: &TurnState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User input
        // ============================================================
        (TurnState::Done, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TurnState::AwaitingModel)
                .with_effect(Effect::append_user_message(text))
                .with_effect(Effect::Checkpoint)
                .with_effect(Effect::RequestModel))
        }

        (TurnState::AwaitingModel | TurnState::DispatchingTool { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::TurnInProgress)
        }

        (TurnState::AwaitingHumanApproval { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::ApprovalPending)
        }

        // ============================================================
        // Model responses
        // ============================================================
        (TurnState::AwaitingModel, Event::ModelResponse { text, tool_calls }) => {
            Ok(handle_model_response(text, tool_calls))
        }

        (TurnState::AwaitingModel, Event::ModelError { message }) => {
            Ok(TransitionResult::new(TurnState::Done)
                .with_effect(Effect::Checkpoint)
                .with_effect(Effect::report_failure(message)))
        }

        // ============================================================
        // Tool dispatch
        // ============================================================
        (TurnState::DispatchingTool { call }, Event::ToolComplete { tool_call_id, output })
            if call.id == tool_call_id =>
        {
            Ok(TransitionResult::new(TurnState::AwaitingModel)
                .with_effect(Effect::append_tool_result(
                    tool_call_id,
                    output.output,
                    !output.success,
                ))
                .with_effect(Effect::Checkpoint)
                .with_effect(Effect::RequestModel))
        }

        // ============================================================
        // Human approval
        // ============================================================
        (TurnState::AwaitingHumanApproval { call, .. }, Event::ApprovalAnswer { answer }) => {
            let outcome = ApprovalOutcome::classify(&answer);
            Ok(TransitionResult::new(TurnState::AwaitingModel)
                .with_effect(Effect::SetApproval(outcome))
                .with_effect(Effect::append_tool_result(
                    call.id.clone(),
                    outcome.tool_result_text(),
                    false,
                ))
                .with_effect(Effect::Checkpoint)
                .with_effect(Effect::RequestModel))
        }

        (_, Event::ApprovalAnswer { .. }) => Err(TransitionError::NoApprovalPending),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.label()
        ))),
    }
}

/// Route a model response: finish, suspend for approval, or dispatch a tool.
///
/// A response with more than one tool call, or naming a tool outside the
/// known set, aborts the turn without touching the log.
fn handle_model_response(text: String, tool_calls: Vec<ToolCallRequest>) -> TransitionResult {
    if tool_calls.len() > 1 {
        let names: Vec<&str> = tool_calls.iter().map(|c| c.name.as_str()).collect();
        return abort_turn(format!(
            "Model requested {} tool calls ({}) in one response; at most one is allowed",
            tool_calls.len(),
            names.join(", ")
        ));
    }

    let Some(request) = tool_calls.first() else {
        return TransitionResult::new(TurnState::Done)
            .with_effect(Effect::AppendMessage(Message::assistant(text, Vec::new())))
            .with_effect(Effect::Checkpoint)
            .with_effect(Effect::notify_turn_done());
    };

    let Some(call) = ToolCall::resolve(request) else {
        return abort_turn(format!("Model requested unknown tool '{}'", request.name));
    };

    let assistant = Effect::AppendMessage(Message::assistant(text, tool_calls.clone()));

    if call.kind == ToolKind::HumanApproval {
        let tool_call_id = call.id.clone();
        TransitionResult::new(TurnState::AwaitingHumanApproval {
            call,
            question: APPROVAL_QUESTION.to_string(),
        })
        .with_effect(assistant)
        .with_effect(Effect::Checkpoint)
        .with_effect(Effect::notify_approval_required(
            tool_call_id,
            APPROVAL_QUESTION,
        ))
    } else {
        TransitionResult::new(TurnState::DispatchingTool { call: call.clone() })
            .with_effect(assistant)
            .with_effect(Effect::Checkpoint)
            .with_effect(Effect::execute_tool(call))
    }
}

fn abort_turn(message: String) -> TransitionResult {
    TransitionResult::new(TurnState::Done)
        .with_effect(Effect::Checkpoint)
        .with_effect(Effect::report_failure(message))
}
