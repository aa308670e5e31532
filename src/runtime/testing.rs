//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::config::Config;
use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, ToolDefinition, Usage};
use crate::state_machine::{ToolCall, ToolKind};
use crate::tools::{ToolOutput, ToolRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Response builders
// ============================================================================

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        content: vec![ContentBlock::text(text)],
        end_turn: true,
        usage: Usage::default(),
    }
}

pub fn tool_response(calls: &[(&str, &str, Value)]) -> LlmResponse {
    LlmResponse {
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::tool_use(*id, *name, input.clone()))
            .collect(),
        end_turn: false,
        usage: Usage::default(),
    }
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Mock LLM client that holds each request until released
pub struct GatedMockLlmClient {
    inner: MockLlmClient,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
    /// Notify to let the pending request finish
    pub release: Arc<Notify>,
}

impl GatedMockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }
}

#[async_trait]
impl LlmClient for GatedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Mock tool executor with predefined outputs
pub struct MockToolExecutor {
    outputs: HashMap<ToolKind, ToolOutput>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(ToolKind, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Set the output for a tool
    pub fn with_tool(mut self, kind: ToolKind, output: ToolOutput) -> Self {
        self.outputs.insert(kind, output);
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(ToolKind, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, _thread_id: &str, call: &ToolCall) -> ToolOutput {
        self.executions
            .lock()
            .unwrap()
            .push((call.kind, call.arguments.clone()));
        self.outputs
            .get(&call.kind)
            .cloned()
            .unwrap_or_else(|| ToolOutput::error(format!("No mock output for {}", call.kind)))
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::from_config(&Config::default()).definitions()
    }
}

// ============================================================================
// Integration tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::runtime::{SseEvent, TurnController, TurnError, TurnStatus};
    use crate::state_machine::{
        ApprovalOutcome, Conversation, Message, Role, ToolCallRequest, TransitionError, TurnState,
        APPROVAL_QUESTION,
    };
    use serde_json::json;

    type TestController =
        TurnController<Arc<InMemoryCheckpointStore>, Arc<MockLlmClient>, Arc<MockToolExecutor>>;

    struct Harness {
        controller: TestController,
        store: Arc<InMemoryCheckpointStore>,
        llm: Arc<MockLlmClient>,
        tools: Arc<MockToolExecutor>,
    }

    fn harness(tools: MockToolExecutor) -> Harness {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let llm = Arc::new(MockLlmClient::new("test-model"));
        let tools = Arc::new(tools);
        Harness {
            controller: TurnController::new(store.clone(), llm.clone(), tools.clone()),
            store,
            llm,
            tools,
        }
    }

    fn roles(messages: &[Message]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let llm = MockLlmClient::new("m");
        llm.queue_response(text_response("hi"));
        let request = LlmRequest {
            system: vec![],
            messages: vec![],
            tools: vec![],
            max_tokens: None,
        };
        assert_eq!(llm.complete(&request).await.unwrap().text(), "hi");
        assert!(llm.complete(&request).await.is_err());
        assert_eq!(llm.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store_latest_write_wins() {
        let store = InMemoryCheckpointStore::new();
        let mut conv = Conversation::new("t1");
        store.save(&conv).await.unwrap();
        conv.push(Message::user("hello"));
        conv.approval = Some(ApprovalOutcome::Proceed);
        store.save(&conv).await.unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded, conv);
        assert!(store.load("t2").await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    /// Plain question answered without tools
    #[tokio::test]
    async fn test_simple_text_response() {
        let h = harness(MockToolExecutor::new());
        h.llm.queue_response(text_response("4"));

        let outcome = h.controller.submit("t1", "What is 2+2?").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(roles(&outcome.messages), vec![Role::User, Role::Assistant]);
        assert_eq!(outcome.messages[1].content, "4");

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 2);
        assert_eq!(stored.turn, TurnState::Done);

        let requests = h.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.len(), ToolKind::ALL.len());
        assert!(requests[0].system[0].text.contains("human_in_the_loop"));
    }

    /// Approval, web search, final answer
    #[tokio::test]
    async fn test_web_search_round_trip() {
        let h = harness(
            MockToolExecutor::new()
                .with_tool(ToolKind::WebSearch, ToolOutput::success("Title: News\nURL: u\nContent: c")),
        );
        h.llm.queue_response(tool_response(&[(
            "call_h",
            "human_in_the_loop",
            json!({"priority_response": "need current news"}),
        )]));

        let outcome = h.controller.submit("t1", "Latest fusion news?").await.unwrap();
        assert_eq!(
            outcome.status,
            TurnStatus::AwaitingApproval {
                question: APPROVAL_QUESTION.to_string()
            }
        );
        assert_eq!(roles(&outcome.messages), vec![Role::User, Role::Assistant]);
        assert!(h.tools.recorded_executions().is_empty());

        h.llm.queue_response(tool_response(&[(
            "call_w",
            "web_search",
            json!({"query": "fusion news"}),
        )]));
        h.llm.queue_response(text_response("Here is the news."));

        let outcome = h.controller.resume("t1", "Yes, go ahead").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(
            roles(&outcome.messages),
            vec![Role::Tool, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(outcome.messages[0].content, "approved");
        assert_eq!(outcome.messages[0].tool_call_id.as_deref(), Some("call_h"));
        assert_eq!(outcome.messages[2].tool_call_id.as_deref(), Some("call_w"));
        assert!(!outcome.messages[2].is_error);

        let executions = h.tools.recorded_executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].0, ToolKind::WebSearch);
        assert_eq!(executions[0].1, json!({"query": "fusion news"}));

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 6);
        assert_eq!(stored.approval, Some(ApprovalOutcome::Proceed));

        // The resumed request carries the decision in the system prompt
        let requests = h.llm.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].system[0]
            .text
            .ends_with("Most recent human decision on web search: proceed"));
    }

    /// Operator declines; the model answers without searching
    #[tokio::test]
    async fn test_approval_declined() {
        let h = harness(MockToolExecutor::new());
        h.llm.queue_response(tool_response(&[(
            "call_h",
            "human_in_the_loop",
            json!({"priority_response": "x"}),
        )]));
        h.controller.submit("t1", "Search the web for cats").await.unwrap();

        h.llm.queue_response(text_response("Okay, I will not search."));
        let outcome = h.controller.resume("t1", "nope").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Done);
        assert_eq!(outcome.messages[0].content, "declined");
        assert!(h.tools.recorded_executions().is_empty());

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(stored.approval, Some(ApprovalOutcome::DoNotProceed));
        assert_eq!(stored.messages().len(), 4);
    }

    /// Two tool calls in one reply abort the turn
    #[tokio::test]
    async fn test_multiple_tool_calls_fail_turn() {
        let h = harness(MockToolExecutor::new());
        h.llm.queue_response(tool_response(&[
            ("c1", "wikipedia_search", json!({"query": "a"})),
            ("c2", "arxiv_search", json!({"query": "b"})),
        ]));

        let outcome = h.controller.submit("t1", "Compare a and b").await.unwrap();

        let TurnStatus::Failed { error } = &outcome.status else {
            panic!("expected failure, got {:?}", outcome.status);
        };
        assert!(error.contains('2'));
        assert_eq!(roles(&outcome.messages), vec![Role::User]);
        assert!(h.tools.recorded_executions().is_empty());

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 1);
        assert_eq!(stored.turn, TurnState::Done);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_turn() {
        let h = harness(MockToolExecutor::new());
        h.llm
            .queue_response(tool_response(&[("c1", "run_shell", json!({"cmd": "ls"}))]));

        let outcome = h.controller.submit("t1", "List files").await.unwrap();

        assert!(matches!(outcome.status, TurnStatus::Failed { .. }));
        assert!(h.tools.recorded_executions().is_empty());
    }

    /// A model error ends the turn without touching the log
    #[tokio::test]
    async fn test_model_error_leaves_log_intact() {
        let h = harness(MockToolExecutor::new());
        h.llm.queue_response(text_response("first answer"));
        h.controller.submit("t1", "hello").await.unwrap();

        h.llm.queue_error(LlmError::auth("Invalid API key"));
        let outcome = h.controller.submit("t1", "again").await.unwrap();
        assert_eq!(
            outcome.status,
            TurnStatus::Failed {
                error: "Invalid API key".to_string()
            }
        );

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(
            roles(stored.messages()),
            vec![Role::User, Role::Assistant, Role::User]
        );

        // The thread accepts the next turn
        h.llm.queue_response(text_response("recovered"));
        let outcome = h.controller.submit("t1", "third").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);
    }

    /// Tool failures become tool results and the turn carries on
    #[tokio::test]
    async fn test_tool_error_becomes_tool_result() {
        let h = harness(MockToolExecutor::new().with_tool(
            ToolKind::ArxivSearch,
            ToolOutput::error("arXiv request failed: timeout"),
        ));
        h.llm.queue_response(tool_response(&[(
            "c1",
            "arxiv_search",
            json!({"query": "diffusion"}),
        )]));
        h.llm.queue_response(text_response("arXiv is unavailable right now."));

        let outcome = h.controller.submit("t1", "Papers on diffusion").await.unwrap();

        assert_eq!(outcome.status, TurnStatus::Done);
        let result = &outcome.messages[2];
        assert_eq!(result.role, Role::Tool);
        assert!(result.is_error);
        assert_eq!(result.content, "arXiv request failed: timeout");
    }

    #[tokio::test]
    async fn test_user_message_while_approval_pending_rejected() {
        let h = harness(MockToolExecutor::new());
        h.llm.queue_response(tool_response(&[(
            "call_h",
            "human_in_the_loop",
            json!({"priority_response": "x"}),
        )]));
        h.controller.submit("t1", "search").await.unwrap();

        let err = h.controller.submit("t1", "hello?").await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::Rejected(TransitionError::ApprovalPending)
        ));

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(stored.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_resume_without_pending_approval_rejected() {
        let h = harness(MockToolExecutor::new());
        let err = h.controller.resume("t1", "yes").await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::Rejected(TransitionError::NoApprovalPending)
        ));
    }

    /// A second request on a busy thread is refused
    #[tokio::test]
    async fn test_concurrent_turn_rejected() {
        let llm = Arc::new(GatedMockLlmClient::new("gated"));
        llm.queue_response(text_response("done"));
        let controller = Arc::new(TurnController::new(
            Arc::new(InMemoryCheckpointStore::new()),
            llm.clone(),
            Arc::new(MockToolExecutor::new()),
        ));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.submit("t1", "first").await })
        };
        llm.request_started.notified().await;

        let err = controller.submit("t1", "second").await.unwrap_err();
        assert!(matches!(err, TurnError::ThreadBusy(_)));

        // Other threads are unaffected by the lock
        let err = controller.resume("t2", "yes").await.unwrap_err();
        assert!(matches!(err, TurnError::Rejected(_)));

        llm.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);
    }

    /// Suspended turns survive a restart when checkpoints are in SQLite
    #[tokio::test]
    async fn test_sqlite_checkpoint_resume_after_restart() {
        let db = Database::open_in_memory().unwrap();

        let llm = Arc::new(MockLlmClient::new("m"));
        llm.queue_response(tool_response(&[(
            "call_h",
            "human_in_the_loop",
            json!({"priority_response": "x"}),
        )]));
        let controller = TurnController::new(
            SqliteCheckpointStore::new(db.clone()),
            llm,
            Arc::new(MockToolExecutor::new()),
        );
        controller.submit("t1", "search please").await.unwrap();
        drop(controller);

        let llm = Arc::new(MockLlmClient::new("m"));
        llm.queue_response(text_response("Skipped the search."));
        let controller = TurnController::new(
            SqliteCheckpointStore::new(db),
            llm,
            Arc::new(MockToolExecutor::new()),
        );
        let conv = controller.conversation("t1").await.unwrap().unwrap();
        assert_eq!(conv.pending_question(), Some(APPROVAL_QUESTION));

        let outcome = controller.resume("t1", "n").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);

        let conv = controller.conversation("t1").await.unwrap().unwrap();
        assert_eq!(conv.messages().len(), 4);
        assert_eq!(conv.approval, Some(ApprovalOutcome::DoNotProceed));
    }

    #[tokio::test]
    async fn test_events_broadcast_to_subscribers() {
        let h = harness(MockToolExecutor::new());
        let mut rx = h.controller.subscribe("t1");
        h.llm.queue_response(text_response("hi"));

        h.controller.submit("t1", "hello").await.unwrap();

        assert!(matches!(rx.recv().await.unwrap(), SseEvent::Message { message } if message.role == Role::User));
        assert!(matches!(rx.recv().await.unwrap(), SseEvent::Message { message } if message.role == Role::Assistant));
        assert!(matches!(rx.recv().await.unwrap(), SseEvent::TurnDone));
    }

    /// Locks and channels are not kept for idle threads
    #[tokio::test]
    async fn test_idle_threads_are_not_tracked() {
        let h = harness(MockToolExecutor::new());

        let rx = h.controller.subscribe("never-used");
        assert_eq!(h.controller.tracked_threads(), (0, 1));
        drop(rx);

        let err = h.controller.resume("unknown", "yes").await.unwrap_err();
        assert!(matches!(
            err,
            TurnError::Rejected(TransitionError::NoApprovalPending)
        ));
        assert_eq!(h.controller.tracked_threads(), (0, 0));

        h.llm.queue_response(text_response("hi"));
        h.controller.submit("t1", "hello").await.unwrap();
        assert_eq!(h.controller.tracked_threads(), (0, 0));

        // A live subscriber keeps its channel across turns
        let mut rx = h.controller.subscribe("t1");
        let _other = h.controller.subscribe("t2");
        h.llm.queue_response(text_response("again"));
        h.controller.submit("t1", "hello again").await.unwrap();
        assert_eq!(h.controller.tracked_threads(), (0, 2));
        assert!(matches!(rx.recv().await.unwrap(), SseEvent::Message { .. }));
    }

    /// A checkpoint left mid-tool is closed out before the next turn
    #[tokio::test]
    async fn test_interrupted_tool_recovered_on_next_turn() {
        let h = harness(MockToolExecutor::new());
        let mut conv = Conversation::new("t1");
        conv.push(Message::user("papers"));
        conv.push(Message::assistant(
            "",
            vec![ToolCallRequest::new("c1", "arxiv_search", json!({"query": "q"}))],
        ));
        conv.turn = TurnState::DispatchingTool {
            call: ToolCall::new("c1", ToolKind::ArxivSearch, json!({"query": "q"})),
        };
        h.store.save(&conv).await.unwrap();

        h.llm.queue_response(text_response("Sorry about that."));
        let outcome = h.controller.submit("t1", "still there?").await.unwrap();
        assert_eq!(outcome.status, TurnStatus::Done);

        let stored = h.store.load("t1").await.unwrap().unwrap();
        assert_eq!(
            roles(stored.messages()),
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::User,
                Role::Assistant
            ]
        );
        assert!(stored.messages()[2].is_error);
    }
}
