//! Turn controller state machine
//!
//! Pure transitions in the Elm Architecture style: `transition` maps the
//! current `TurnState` and an `Event` to a new state plus `Effect`s, and the
//! runtime performs the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notification};
pub use event::Event;
pub use state::{
    ApprovalOutcome, Conversation, Message, Role, ThreadSummary, ToolCall, ToolCallRequest,
    ToolKind, TurnState, APPROVAL_QUESTION,
};
pub use transition::{transition, TransitionError};
