//! System prompt construction
//!
//! A fixed base prompt describing the tools and the approval rule, plus the
//! most recent human decision when the thread has one.

use crate::state_machine::ApprovalOutcome;
use std::fmt::Write;

/// Base system prompt establishing the agent's role
const BASE_PROMPT: &str = r"You are a research assistant. Answer directly when you can. When you need outside information, use one of these tools:

- wikipedia_search: general knowledge about people, places, events and concepts.
- arxiv_search: scientific papers and preprints.
- web_search: current information from the web.

Before every web_search you must call human_in_the_loop to ask the operator for approval. If the operator declines, do not call web_search for that request; answer from what you already know or use another tool.

Request at most one tool per reply. Wait for each tool result before deciding on the next step.

Be concise in your responses.";

/// Build the system prompt for a model request
pub fn build_system_prompt(approval: Option<ApprovalOutcome>) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    if let Some(outcome) = approval {
        let _ = write!(
            prompt,
            "\n\nMost recent human decision on web search: {outcome}"
        );
    }

    prompt
}
