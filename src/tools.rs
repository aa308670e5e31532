//! Tool adapters offered to the model
//!
//! Tools are stateless apart from their result ceilings; everything a call
//! needs arrives through `ToolContext`. Adapter failures are returned as error
//! outputs and never escape the dispatch step.

mod arxiv_search;
mod human_approval;
mod web_search;
mod wikipedia_search;

pub use arxiv_search::ArxivSearchTool;
pub use human_approval::HumanApprovalTool;
pub use web_search::WebSearchTool;
pub use wikipedia_search::WikipediaSearchTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::llm::ToolDefinition;
use crate::state_machine::{ToolCall, ToolKind};

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call. The HTTP client is shared process-wide
/// so connection pools are reused across threads.
#[derive(Clone)]
pub struct ToolContext {
    /// The thread this tool is executing within
    pub thread_id: String,
    client: reqwest::Client,
    config: Arc<Config>,
}

impl ToolContext {
    pub fn new(thread_id: impl Into<String>, client: reqwest::Client, config: Arc<Config>) -> Self {
        Self {
            thread_id: thread_id.into(),
            client,
            config,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Trait for tools that can be offered to the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool with all context provided via `ToolContext`
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// The closed set of tools, one adapter per `ToolKind`
pub struct ToolRegistry {
    web: WebSearchTool,
    arxiv: ArxivSearchTool,
    wikipedia: WikipediaSearchTool,
    approval: HumanApprovalTool,
}

impl ToolRegistry {
    pub fn from_config(config: &Config) -> Self {
        Self {
            web: WebSearchTool::new(config.web_limits),
            arxiv: ArxivSearchTool::new(config.arxiv_limits),
            wikipedia: WikipediaSearchTool::new(config.wikipedia_limits),
            approval: HumanApprovalTool,
        }
    }

    fn tool(&self, kind: ToolKind) -> &dyn Tool {
        match kind {
            ToolKind::WebSearch => &self.web,
            ToolKind::ArxivSearch => &self.arxiv,
            ToolKind::WikipediaSearch => &self.wikipedia,
            ToolKind::HumanApproval => &self.approval,
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .map(|kind| {
                let t = self.tool(kind);
                ToolDefinition {
                    name: t.name().to_string(),
                    description: t.description(),
                    input_schema: t.input_schema(),
                }
            })
            .collect()
    }

    /// Run a validated tool call
    pub async fn execute(&self, call: &ToolCall, ctx: ToolContext) -> ToolOutput {
        let thread_id = ctx.thread_id.clone();
        let started = Instant::now();
        let output = self.tool(call.kind).run(call.arguments.clone(), ctx).await;

        tracing::info!(
            thread_id = %thread_id,
            tool = %call.kind,
            tool_call_id = %call.id,
            success = output.success,
            output_chars = output.output.chars().count(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool finished"
        );
        output
    }
}

// ============================================================================
// Shared adapter helpers
// ============================================================================

/// Input accepted by every search adapter
#[derive(Debug, Deserialize)]
pub(crate) struct SearchInput {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<u64>,
}

impl SearchInput {
    pub(crate) fn parse(input: Value) -> Result<Self, String> {
        let parsed: Self =
            serde_json::from_value(input).map_err(|e| format!("Invalid input: {e}"))?;
        if parsed.query.trim().is_empty() {
            return Err("Invalid input: query must not be empty".to_string());
        }
        Ok(parsed)
    }
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text.get(..byte_idx).unwrap_or(text).to_string(),
        None => text.to_string(),
    }
}

/// Collapse runs of whitespace (including newlines) to single spaces
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn a non-success HTTP response into error text
pub(crate) async fn status_error(service: &str, response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!(
        "{service} request failed with status {status}: {}",
        truncate_chars(body.trim(), 200)
    )
}
