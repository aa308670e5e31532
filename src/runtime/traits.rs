//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the turn controller with mock implementations.

use crate::config::Config;
use crate::db::Database;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ToolDefinition};
use crate::state_machine::{Conversation, ThreadSummary, ToolCall};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-thread checkpoint storage
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Write the conversation under its thread id. Latest write wins.
    async fn save(&self, conversation: &Conversation) -> Result<(), String>;

    /// Read the latest checkpoint for a thread
    async fn load(&self, thread_id: &str) -> Result<Option<Conversation>, String>;

    /// All known threads, most recently updated first
    async fn list(&self) -> Result<Vec<ThreadSummary>, String>;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Executor for search tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run a validated tool call. Failures come back as error outputs.
    async fn execute(&self, thread_id: &str, call: &ToolCall) -> ToolOutput;

    /// Get tool definitions for LLM
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        (**self).save(conversation).await
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Conversation>, String> {
        (**self).load(thread_id).await
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, String> {
        (**self).list().await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, thread_id: &str, call: &ToolCall) -> ToolOutput {
        (**self).execute(thread_id, call).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Process-lifetime checkpoint store
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: Mutex<HashMap<String, Conversation>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.threads
            .lock()
            .unwrap()
            .insert(conversation.thread_id.clone(), conversation.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Conversation>, String> {
        Ok(self.threads.lock().unwrap().get(thread_id).cloned())
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, String> {
        let mut summaries: Vec<ThreadSummary> = self
            .threads
            .lock()
            .unwrap()
            .values()
            .map(Conversation::summary)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// Adapter to use Database as a checkpoint store
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    db: Database,
}

impl SqliteCheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), String> {
        self.db
            .save_conversation(conversation)
            .map_err(|e| e.to_string())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Conversation>, String> {
        self.db
            .load_conversation(thread_id)
            .map_err(|e| e.to_string())
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, String> {
        self.db.list_threads().map_err(|e| e.to_string())
    }
}

/// Adapter to use an `LlmService` as `LlmClient`
pub struct LlmServiceClient {
    service: Arc<dyn LlmService>,
}

impl LlmServiceClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for LlmServiceClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

/// Adapter to use `ToolRegistry` as `ToolExecutor`
pub struct ToolRegistryExecutor {
    registry: ToolRegistry,
    client: reqwest::Client,
    config: Arc<Config>,
}

impl ToolRegistryExecutor {
    pub fn new(registry: ToolRegistry, client: reqwest::Client, config: Arc<Config>) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistryExecutor {
    async fn execute(&self, thread_id: &str, call: &ToolCall) -> ToolOutput {
        let ctx = ToolContext::new(thread_id, self.client.clone(), self.config.clone());
        self.registry.execute(call, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }
}
