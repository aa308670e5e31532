//! Conversation state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Question surfaced to the operator when the model asks for approval
pub const APPROVAL_QUESTION: &str = "Please verify if Web Based Search needs to be proceeded with";

// ============================================================================
// Tool identifiers - the closed set of tools the model may call
// ============================================================================

/// Every tool the model is offered. Dispatch matches on this exhaustively;
/// a name outside this set never becomes a `ToolCall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    ArxivSearch,
    WikipediaSearch,
    #[serde(rename = "human_in_the_loop")]
    HumanApproval,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::WebSearch,
        ToolKind::HumanApproval,
        ToolKind::ArxivSearch,
        ToolKind::WikipediaSearch,
    ];

    /// Name the model uses to call the tool
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::ArxivSearch => "arxiv_search",
            ToolKind::WikipediaSearch => "wikipedia_search",
            ToolKind::HumanApproval => "human_in_the_loop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Tool calls
// ============================================================================

/// A tool call exactly as the model emitted it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A validated tool call: the name resolved to a known `ToolKind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub kind: ToolKind,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, kind: ToolKind, arguments: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            arguments,
        }
    }

    /// Resolve a raw request; `None` when the tool name is unknown
    pub fn resolve(request: &ToolCallRequest) -> Option<Self> {
        ToolKind::from_name(&request.name)
            .map(|kind| Self::new(request.id.clone(), kind, request.arguments.clone()))
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Tool calls requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Correlates a tool-result message with the request that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, text)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            is_error,
            ..Self::with_role(Role::Tool, content)
        }
    }
}

// ============================================================================
// Human approval
// ============================================================================

/// Outcome of the most recent human-approval decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalOutcome {
    Proceed,
    #[serde(rename = "do not proceed", alias = "do_not_proceed")]
    DoNotProceed,
}

impl ApprovalOutcome {
    /// Classify a free-text answer by its first non-whitespace character.
    pub fn classify(answer: &str) -> Self {
        match answer.trim_start().chars().next() {
            Some(c) if c.to_ascii_lowercase() == 'y' => ApprovalOutcome::Proceed,
            _ => ApprovalOutcome::DoNotProceed,
        }
    }

    /// Text of the tool-result message recorded for this outcome
    pub fn tool_result_text(self) -> &'static str {
        match self {
            ApprovalOutcome::Proceed => "approved",
            ApprovalOutcome::DoNotProceed => "declined",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalOutcome::Proceed => "proceed",
            ApprovalOutcome::DoNotProceed => "do not proceed",
        }
    }
}

impl fmt::Display for ApprovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Turn state
// ============================================================================

/// Where the turn controller is within the current turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// No turn in progress; the next user message starts one
    #[default]
    Done,

    /// Waiting on the model to answer the current history
    AwaitingModel,

    /// Running a search tool the model asked for
    DispatchingTool { call: ToolCall },

    /// Suspended until the operator answers the approval question
    AwaitingHumanApproval { call: ToolCall, question: String },
}

impl TurnState {
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::Done => "done",
            TurnState::AwaitingModel => "awaiting_model",
            TurnState::DispatchingTool { .. } => "dispatching_tool",
            TurnState::AwaitingHumanApproval { .. } => "awaiting_human_approval",
        }
    }
}

// ============================================================================
// Conversation snapshot
// ============================================================================

/// Everything checkpointed for one thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub thread_id: String,
    messages: Vec<Message>,
    #[serde(default)]
    pub approval: Option<ApprovalOutcome>,
    #[serde(default)]
    pub turn: TurnState,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            approval: None,
            turn: TurnState::Done,
            updated_at: Utc::now(),
        }
    }

    /// The log in chronological order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append to the log. The only way the log changes.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Rebuild a conversation read back from storage
    pub fn restore(
        thread_id: impl Into<String>,
        messages: Vec<Message>,
        approval: Option<ApprovalOutcome>,
        turn: TurnState,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages,
            approval,
            turn,
            updated_at,
        }
    }

    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            thread_id: self.thread_id.clone(),
            message_count: self.messages.len(),
            turn: self.turn.label().to_string(),
            updated_at: self.updated_at,
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The pending approval question, if the turn is suspended
    pub fn pending_question(&self) -> Option<&str> {
        match &self.turn {
            TurnState::AwaitingHumanApproval { question, .. } => Some(question),
            _ => None,
        }
    }
}

/// Listing entry for a stored thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub message_count: usize,
    pub turn: String,
    pub updated_at: DateTime<Utc>,
}
