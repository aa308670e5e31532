//! Database module for scout-chat
//!
//! Persists thread checkpoints. One row per thread holds the turn state and
//! approval field; the message log has its own table keyed by sequence
//! number and is only ever appended to.

mod schema;

use schema::{approval_to_str, parse_approval, parse_datetime, parse_role, SCHEMA};

use crate::state_machine::{Conversation, Message, ThreadSummary, ToolCallRequest, TurnState};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Checkpoint for thread {thread_id} has {offered} messages but {stored} are already stored")]
    LogRewritten {
        thread_id: String,
        stored: usize,
        offered: usize,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Write a checkpoint. Thread fields are overwritten; messages past the
    /// stored tail are appended.
    pub fn save_conversation(&self, conv: &Conversation) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let thread_id = conv.thread_id.as_str();
        let turn_state = serde_json::to_string(&conv.turn)?;
        let updated_at = conv.updated_at.to_rfc3339();

        tx.execute(
            "INSERT INTO threads (thread_id, turn_state, approval, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(thread_id) DO UPDATE SET
                turn_state = excluded.turn_state,
                approval = excluded.approval,
                updated_at = excluded.updated_at",
            params![
                thread_id,
                turn_state,
                conv.approval.map(approval_to_str),
                updated_at
            ],
        )?;

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        let stored = usize::try_from(stored).unwrap_or(0);
        let messages = conv.messages();
        if stored > messages.len() {
            return Err(DbError::LogRewritten {
                thread_id: thread_id.to_string(),
                stored,
                offered: messages.len(),
            });
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages (message_id, thread_id, sequence_id, role, content,
                                       tool_calls, tool_call_id, is_error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (index, msg) in messages.iter().enumerate().skip(stored) {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&msg.tool_calls)?)
                };
                let sequence_id = i64::try_from(index + 1).unwrap_or(i64::MAX);
                stmt.execute(params![
                    msg.id,
                    thread_id,
                    sequence_id,
                    msg.role.as_str(),
                    msg.content,
                    tool_calls,
                    msg.tool_call_id,
                    msg.is_error,
                    msg.created_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Read a checkpoint back; `None` for a thread never saved
    pub fn load_conversation(&self, thread_id: &str) -> DbResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let Some((turn_state, approval, updated_at)) = conn
            .query_row(
                "SELECT turn_state, approval, updated_at FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT message_id, role, content, tool_calls, tool_call_id, is_error, created_at
             FROM messages WHERE thread_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let messages = stmt
            .query_map(params![thread_id], parse_message_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let turn: TurnState = serde_json::from_str(&turn_state)?;

        Ok(Some(Conversation::restore(
            thread_id,
            messages,
            approval.as_deref().and_then(parse_approval),
            turn,
            parse_datetime(&updated_at),
        )))
    }

    /// All stored threads, most recently updated first
    pub fn list_threads(&self) -> DbResult<Vec<ThreadSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT t.thread_id, t.turn_state, t.updated_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.thread_id = t.thread_id)
             FROM threads t ORDER BY t.updated_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let turn_state: String = row.get(1)?;
            let count: i64 = row.get(3)?;
            Ok(ThreadSummary {
                thread_id: row.get(0)?,
                turn: serde_json::from_str::<TurnState>(&turn_state)
                    .map_or("unknown", |t| t.label())
                    .to_string(),
                updated_at: parse_datetime(&row.get::<_, String>(2)?),
                message_count: usize::try_from(count).unwrap_or(0),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn parse_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let tool_calls: Vec<ToolCallRequest> = row
        .get::<_, Option<String>>(3)?
        .map(|s| serde_json::from_str(&s).unwrap_or_default())
        .unwrap_or_default();

    Ok(Message {
        id: row.get(0)?,
        role: parse_role(&row.get::<_, String>(1)?),
        content: row.get(2)?,
        tool_calls,
        tool_call_id: row.get(4)?,
        is_error: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}
