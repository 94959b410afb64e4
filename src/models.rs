// ============================================================================
// File: src/models.rs
// Search, analysis and API wire models
// ============================================================================

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Search parameters as accepted from callers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchQuery {
    pub query: String,

    /// Search categories (general, news, images, ...)
    #[serde(default)]
    pub categories: Option<Vec<String>>,

    /// Specific engines to use
    #[serde(default)]
    pub engines: Option<Vec<String>>,

    /// "off", "moderate" or "strict"
    #[serde(default = "default_safe_search")]
    pub safe_search: String,

    /// "day", "week", "month" or "year"
    #[serde(default)]
    pub time_range: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,
}

fn default_safe_search() -> String {
    "moderate".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            categories: None,
            engines: None,
            safe_search: default_safe_search(),
            time_range: None,
            language: default_language(),
        }
    }
}

/// One normalized search hit
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub content: String,
    pub engine: String,
    pub score: Option<f64>,
    pub published_at: Option<NaiveDateTime>,
}

/// Normalized output of one search call
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResultSet {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub total_results: usize,
    pub engines_used: BTreeSet<String>,
    /// Seconds
    pub search_duration: f64,
}

pub fn top_urls(results: &[SearchResultItem], n: usize) -> Vec<String> {
    results.iter().take(n).map(|r| r.url.clone()).collect()
}

/// Input to one analysis call; borrows the result items
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub query: &'a str,
    pub results: &'a [SearchResultItem],
    pub context: Option<&'a str>,
    pub model: Option<&'a str>,
}

/// Structured analysis of a result set
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisResult {
    pub query: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub sources: Vec<String>,
    /// In [0.0, 1.0]. Failed analyses report 0.0, but a model may also report 0.0
    /// for a successful one; only the summary tells the two apart.
    pub confidence: f64,
    pub model_used: String,
    /// Seconds
    pub duration: f64,
}

/// Combined search + analysis request
#[derive(Debug, Clone)]
pub struct WebSearchRequest {
    pub search: SearchQuery,
    pub analyze: bool,
    pub context: Option<String>,
    pub model: Option<String>,
}

/// Combined search + analysis response
#[derive(Debug, Serialize, Clone)]
pub struct WebSearchResponse {
    pub query: String,
    pub search_results: SearchResultSet,
    pub ai_analysis: Option<AnalysisResult>,
    pub cached: bool,
    pub timestamp: DateTime<Local>,
}

/// Aggregate health of the collaborators
#[derive(Debug, Serialize, Clone)]
pub struct HealthReport {
    pub status: String,
    pub searxng: bool,
    pub ai_analysis: bool,
    pub cache: bool,
    pub version: String,
}

/// Message structure for chat completions
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: String, // "system", "user", or "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for the OpenAI-compatible chat completions endpoint
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Response from the chat completions endpoint
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub model: Option<String>,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

/// Response from SearXNG search API
#[derive(Debug, Deserialize)]
pub struct SearXNGResponse {
    #[serde(default)]
    pub results: Vec<RawSearchRecord>,
}

/// Result record exactly as SearXNG reports it
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawSearchRecord {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub engine: Option<String>,
    pub score: Option<f64>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
}
