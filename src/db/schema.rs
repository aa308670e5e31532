//! Database schema and row helpers

use crate::state_machine::{ApprovalOutcome, Role};
use chrono::{DateTime, Utc};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS threads (
    thread_id TEXT PRIMARY KEY,
    turn_state TEXT NOT NULL,
    approval TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_calls TEXT,
    tool_call_id TEXT,
    is_error BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,

    UNIQUE (thread_id, sequence_id),
    FOREIGN KEY (thread_id) REFERENCES threads(thread_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, sequence_id);
";

pub(super) fn parse_role(s: &str) -> Role {
    // Rows are only ever written from a `Role`
    Role::parse(s).unwrap_or(Role::Assistant)
}

pub(super) fn approval_to_str(outcome: ApprovalOutcome) -> &'static str {
    match outcome {
        ApprovalOutcome::Proceed => "proceed",
        ApprovalOutcome::DoNotProceed => "do_not_proceed",
    }
}

pub(super) fn parse_approval(s: &str) -> Option<ApprovalOutcome> {
    match s {
        "proceed" => Some(ApprovalOutcome::Proceed),
        "do_not_proceed" => Some(ApprovalOutcome::DoNotProceed),
        _ => None,
    }
}

pub(super) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
