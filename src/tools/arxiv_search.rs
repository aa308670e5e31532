//! Paper search against the arXiv export API
//!
//! The API answers with an Atom feed. Only four fields per entry are used,
//! so the feed is scanned with a handful of patterns rather than a full XML
//! parser.

use super::{
    squash_whitespace, status_error, truncate_chars, SearchInput, Tool, ToolContext, ToolOutput,
};
use crate::config::SearchLimits;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

const ARXIV_URL: &str = "https://export.arxiv.org/api/query";

const NO_RESULTS: &str = "No good Arxiv Result was found";

/// arXiv rejects very long queries
const MAX_QUERY_CHARS: usize = 300;

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap());
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<published>(.*?)</published>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").unwrap());
static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").unwrap());
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").unwrap());

#[derive(Debug, PartialEq)]
struct Paper {
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

pub struct ArxivSearchTool {
    limits: SearchLimits,
}

impl ArxivSearchTool {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    async fn search(&self, input: SearchInput, ctx: &ToolContext) -> Result<String, String> {
        let max_results = self.limits.effective_results(input.max_results);
        let query = truncate_chars(input.query.trim(), MAX_QUERY_CHARS);

        let response = ctx
            .client()
            .get(ARXIV_URL)
            .query(&[
                ("search_query", format!("all:{query}")),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| format!("arXiv request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(status_error("arXiv", response).await);
        }

        let feed = response
            .text()
            .await
            .map_err(|e| format!("arXiv returned an unreadable response: {e}"))?;

        let mut papers = parse_feed(&feed);
        papers.truncate(max_results);
        Ok(format_papers(&papers, self.limits.max_chars))
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| squash_whitespace(&unescape(m.as_str())))
        .unwrap_or_default()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn parse_feed(feed: &str) -> Vec<Paper> {
    ENTRY_RE
        .captures_iter(feed)
        .filter_map(|c| c.get(1))
        .map(|entry| {
            let entry = entry.as_str();
            // Atom timestamps are RFC 3339; keep the date part
            let published: String = capture(&PUBLISHED_RE, entry).chars().take(10).collect();
            Paper {
                published,
                title: capture(&TITLE_RE, entry),
                authors: AUTHOR_RE
                    .captures_iter(entry)
                    .filter_map(|c| c.get(1))
                    .map(|m| squash_whitespace(&unescape(m.as_str())))
                    .collect(),
                summary: capture(&SUMMARY_RE, entry),
            }
        })
        .filter(|paper| !paper.title.is_empty())
        .collect()
}

fn format_papers(papers: &[Paper], max_chars: usize) -> String {
    if papers.is_empty() {
        return NO_RESULTS.to_string();
    }
    let text = papers
        .iter()
        .map(|p| {
            format!(
                "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
                p.published,
                p.title,
                p.authors.join(", "),
                p.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&text, max_chars)
}

#[async_trait]
impl Tool for ArxivSearchTool {
    fn name(&self) -> &'static str {
        "arxiv_search"
    }

    fn description(&self) -> String {
        "Search arXiv for scientific papers. Returns publication date, title, authors and the start of the abstract.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query, e.g. a paper title, topic or arXiv id"
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
                tracing::warn!(thread_id = %ctx.thread_id, error = %e, "arXiv search failed");
                ToolOutput::error(e)
            }
        }
    }
}
