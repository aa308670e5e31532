//! Recovery of interrupted turns
//!
//! A turn only runs while its thread lock is held, so a checkpoint that still
//! says `AwaitingModel` or `DispatchingTool` when the lock is next acquired
//! belongs to a turn that died part way (process restart, storage failure).
//! Such threads are closed out so the next user message can start a turn.

use crate::state_machine::{Conversation, Message, TurnState};

/// Tool-result text recorded for a tool call that never completed
pub const INTERRUPTED_TOOL_RESULT: &str = "[Tool execution interrupted before it completed]";

/// What recovery did to a loaded conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Turn was idle or waiting on the operator
    NotInterrupted,
    /// Turn died waiting on the model; nothing dangling in the log
    InterruptedModelRequest,
    /// Turn died while a tool ran; a synthetic error result was appended
    InterruptedTool,
}

/// Close out an interrupted turn in place.
///
/// An interrupted tool call gets an error result so every tool call in the
/// log stays answered, which the model endpoint requires.
pub fn recover_interrupted(conv: &mut Conversation) -> RecoveryReason {
    let reason = match &conv.turn {
        TurnState::Done | TurnState::AwaitingHumanApproval { .. } => {
            return RecoveryReason::NotInterrupted
        }
        TurnState::AwaitingModel => RecoveryReason::InterruptedModelRequest,
        TurnState::DispatchingTool { call } => {
            let result = Message::tool_result(call.id.clone(), INTERRUPTED_TOOL_RESULT, true);
            conv.push(result);
            RecoveryReason::InterruptedTool
        }
    };
    conv.turn = TurnState::Done;
    reason
}
