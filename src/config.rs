//! Process configuration
//!
//! Built once at startup from the environment and shared by reference.
//! Nothing downstream reads environment variables directly.

use std::path::PathBuf;
use thiserror::Error;

/// Default chat-completions endpoint (Groq, `OpenAI`-compatible)
pub const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model served by the endpoint above
pub const DEFAULT_MODEL: &str = "gemma2-9b-it";

const DEFAULT_PORT: u16 = 8000;

/// Result-count and text-length ceilings for one search adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_results: usize,
    pub max_chars: usize,
}

impl SearchLimits {
    pub const fn new(max_results: usize, max_chars: usize) -> Self {
        Self {
            max_results,
            max_chars,
        }
    }

    /// Clamp a caller-requested result count to the ceiling.
    ///
    /// The requested count can lower the ceiling but never raise it; zero is
    /// treated as "use the ceiling".
    pub fn effective_results(&self, requested: Option<u64>) -> usize {
        match requested.and_then(|r| usize::try_from(r).ok()) {
            Some(0) | None => self.max_results,
            Some(r) => r.min(self.max_results),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required credential(s): {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential for the model endpoint (`GROQ_API_KEY`)
    pub llm_api_key: Option<String>,
    /// Credential for the web search service (`TAVILY_API_KEY`)
    pub search_api_key: Option<String>,
    /// Optional run-tracing credential (`LANGSMITH_API_KEY`)
    pub tracing_api_key: Option<String>,
    pub model: String,
    pub llm_url: String,
    pub port: u16,
    /// SQLite checkpoint file; `None` keeps checkpoints in memory
    pub db_path: Option<PathBuf>,
    pub web_limits: SearchLimits,
    pub arxiv_limits: SearchLimits,
    pub wikipedia_limits: SearchLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            search_api_key: None,
            tracing_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            llm_url: DEFAULT_LLM_URL.to_string(),
            port: DEFAULT_PORT,
            db_path: None,
            web_limits: SearchLimits::new(2, 2000),
            arxiv_limits: SearchLimits::new(1, 300),
            wikipedia_limits: SearchLimits::new(1, 300),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_or = |key: &str, fallback: usize| {
            get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            llm_api_key: get("GROQ_API_KEY"),
            search_api_key: get("TAVILY_API_KEY"),
            tracing_api_key: get("LANGSMITH_API_KEY"),
            model: get("SCOUT_MODEL").unwrap_or(defaults.model),
            llm_url: get("SCOUT_LLM_URL").unwrap_or(defaults.llm_url),
            port: get("SCOUT_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            db_path: get("SCOUT_DB_PATH").map(PathBuf::from),
            web_limits: SearchLimits::new(
                parse_or("SCOUT_WEB_MAX_RESULTS", defaults.web_limits.max_results),
                parse_or("SCOUT_WEB_MAX_CHARS", defaults.web_limits.max_chars),
            ),
            arxiv_limits: SearchLimits::new(
                defaults.arxiv_limits.max_results,
                parse_or("SCOUT_ARXIV_MAX_CHARS", defaults.arxiv_limits.max_chars),
            ),
            wikipedia_limits: SearchLimits::new(
                defaults.wikipedia_limits.max_results,
                parse_or("SCOUT_WIKI_MAX_CHARS", defaults.wikipedia_limits.max_chars),
            ),
        }
    }

    /// Check that the credentials needed for model and search calls exist.
    ///
    /// The tracing credential is optional and never reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.llm_api_key.is_none() {
            missing.push("GROQ_API_KEY");
        }
        if self.search_api_key.is_none() {
            missing.push("TAVILY_API_KEY");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }
}
