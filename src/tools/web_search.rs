//! Web search through the Tavily search API

use super::{status_error, truncate_chars, SearchInput, Tool, ToolContext, ToolOutput};
use crate::config::SearchLimits;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const TAVILY_URL: &str = "https://api.tavily.com/search";

const NO_RESULTS: &str = "No good Web Search Result was found";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

pub struct WebSearchTool {
    limits: SearchLimits,
}

impl WebSearchTool {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    async fn search(&self, input: SearchInput, ctx: &ToolContext) -> Result<String, String> {
        let api_key = ctx
            .config()
            .search_api_key
            .as_deref()
            .ok_or("Web search is unavailable: TAVILY_API_KEY is not set")?;
        let max_results = self.limits.effective_results(input.max_results);

        let response = ctx
            .client()
            .post(TAVILY_URL)
            .bearer_auth(api_key)
            .json(&json!({
                "query": input.query,
                "max_results": max_results,
                "search_depth": "basic",
            }))
            .send()
            .await
            .map_err(|e| format!("Web search request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(status_error("Web search", response).await);
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| format!("Web search returned an unreadable response: {e}"))?;

        Ok(format_results(&body.results, max_results, self.limits.max_chars))
    }
}

fn format_results(results: &[TavilyResult], max_results: usize, max_chars: usize) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }
    let text = results
        .iter()
        .take(max_results)
        .map(|r| format!("Title: {}\nURL: {}\nContent: {}", r.title, r.url, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, max_chars)
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> String {
        "Search the web for current information. Returns titles, URLs and page content for the top results. Requires the operator's approval through human_in_the_loop first.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Optional number of results (capped by the server)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input = match SearchInput::parse(input) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(e),
        };
        match self.search(input, &ctx).await {
            Ok(text) => ToolOutput::success(text),
            Err(e) => {
                tracing::warn!(thread_id = %ctx.thread_id, error = %e, "Web search failed");
                ToolOutput::error(e)
            }
        }
    }
}
