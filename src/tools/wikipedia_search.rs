//! Encyclopedia lookup against the `MediaWiki` API
//!
//! Two requests per search: `list=search` finds page titles, then
//! `prop=extracts` fetches the plain-text intro of each page.

use super::{status_error, truncate_chars, SearchInput, Tool, ToolContext, ToolOutput};
use crate::config::SearchLimits;
use async_trait::async_trait;
use serde_json::{json, Value};

const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

const NO_RESULTS: &str = "No good Wikipedia Search Result was found";

const MAX_QUERY_CHARS: usize = 300;

pub struct WikipediaSearchTool {
    limits: SearchLimits,
}

impl WikipediaSearchTool {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    async fn get_json(ctx: &ToolContext, params: &[(&str, &str)]) -> Result<Value, String> {
        let response = ctx
            .client()
            .get(WIKIPEDIA_API_URL)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(|e| format!("Wikipedia request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(status_error("Wikipedia", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| format!("Wikipedia returned an unreadable response: {e}"))
    }

    async fn search(&self, input: SearchInput, ctx: &ToolContext) -> Result<String, String> {
        let max_results = self.limits.effective_results(input.max_results);
        let query = truncate_chars(input.query.trim(), MAX_QUERY_CHARS);
        let limit = max_results.to_string();

        let found = Self::get_json(
            ctx,
            &[("list", "search"), ("srsearch", query.as_str()), ("srlimit", limit.as_str())],
        )
        .await?;

        let mut pages = Vec::new();
        for title in search_titles(&found).into_iter().take(max_results) {
            let body = Self::get_json(
                ctx,
                &[
                    ("prop", "extracts"),
                    ("exintro", "1"),
                    ("explaintext", "1"),
                    ("redirects", "1"),
                    ("titles", title.as_str()),
                ],
            )
            .await?;
            if let Some(summary) = page_extract(&body) {
                pages.push((title, summary));
            }
        }

        Ok(format_pages(&pages, self.limits.max_chars))
    }
}

fn search_titles(body: &Value) -> Vec<String> {
    body["query"]["search"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit["title"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The intro text of the first page in an extracts response. Missing pages
/// carry no `extract` and are skipped.
fn page_extract(body: &Value) -> Option<String> {
    body["query"]["pages"]
        .as_object()?
        .values()
        .find_map(|page| page["extract"].as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn format_pages(pages: &[(String, String)], max_chars: usize) -> String {
    if pages.is_empty() {
        return NO_RESULTS.to_string();
    }
    let text = pages
        .iter()
        .map(|(title, summary)| format!("Page: {title}\nSummary: {summary}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, max_chars)
}

#[async_trait]
impl Tool for WikipediaSearchTool {
    fn name(&self) -> &'static str {
        "wikipedia_search"
    }

    fn description(&self) -> String {
        "Look up a topic on Wikipedia. Returns the page title and the start of its summary. Useful for general knowledge about people, places, events and concepts.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic to look up"
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
                tracing::warn!(thread_id = %ctx.thread_id, error = %e, "Wikipedia search failed");
                ToolOutput::error(e)
            }
        }
    }
}
