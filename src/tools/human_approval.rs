//! Human approval gate for web search
//!
//! The model calls this like any other tool, but the turn controller answers
//! it by suspending the turn until the operator replies. `run` is never part
//! of that path.

use super::{Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct HumanApprovalTool;

#[async_trait]
impl Tool for HumanApprovalTool {
    fn name(&self) -> &'static str {
        "human_in_the_loop"
    }

    fn description(&self) -> String {
        "Ask the human operator whether a web search may go ahead. Call this before every web_search; the operator's decision is returned as \"approved\" or \"declined\".".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["priority_response"],
            "properties": {
                "priority_response": {
                    "type": "string",
                    "description": "Short note on why the web search is needed"
                }
            }
        })
    }

    async fn run(&self, _input: Value, ctx: ToolContext) -> ToolOutput {
        tracing::error!(thread_id = %ctx.thread_id, "human_in_the_loop dispatched as a tool");
        ToolOutput::error("human_in_the_loop is answered by the operator and cannot be executed")
    }
}
