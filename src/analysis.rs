// ============================================================================
// File: src/analysis.rs
// AI analysis of search results with graceful degradation
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tiktoken_rs::cl100k_base;
use tracing::{debug, error, info, Level};

use crate::error::{AnalysisError, ParseError};
use crate::extractor::{Extraction, ResponseExtractor, MAX_KEY_POINTS, MAX_SUMMARY_CHARS};
use crate::llm_client::{CompletionRequest, TextCompletionProvider};
use crate::models::{top_urls, AnalysisRequest, AnalysisResult, Message};

pub const ANALYSIS_TEMPERATURE: f32 = 0.3;
pub const ANALYSIS_MAX_TOKENS: usize = 2000;
pub const MAX_SOURCES: usize = 3;

const MAX_PROMPT_RESULTS: usize = 10;
const MAX_PROMPT_CONTENT_CHARS: usize = 500;
const UNAVAILABLE_KEY_POINT: &str = "Analysis service temporarily unavailable";

const SYSTEM_PROMPT: &str = "You are an expert research analyst. Your task is to analyze web search results and provide comprehensive, accurate summaries.

Key requirements:
1. Provide a clear, concise summary of the main findings
2. Extract 3-5 key points from the search results
3. List the most relevant sources
4. Assign a confidence score (0.0-1.0) based on source quality and consistency
5. Be objective and factual
6. If information is conflicting, mention the discrepancies
7. Format your response as valid JSON with the required fields";

pub struct AnalysisPipeline {
    provider: Arc<dyn TextCompletionProvider>,
    extractor: Box<dyn ResponseExtractor>,
    default_model: String,
}

impl AnalysisPipeline {
    pub fn new(
        provider: Arc<dyn TextCompletionProvider>,
        extractor: Box<dyn ResponseExtractor>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            extractor,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Analyze a result set. Never fails: any error becomes a zero-confidence result.
    pub async fn analyze(&self, request: &AnalysisRequest<'_>) -> AnalysisResult {
        let start = Instant::now();
        let model = request.model.unwrap_or(&self.default_model);

        match self.try_analyze(request, model, start).await {
            Ok(result) => {
                info!(
                    query = request.query,
                    model = %result.model_used,
                    analysis_time = result.duration,
                    confidence = result.confidence,
                    "AI analysis completed"
                );
                result
            }
            Err(e) => {
                error!(query = request.query, model, error = %e, "AI analysis failed");
                AnalysisResult {
                    query: request.query.to_string(),
                    summary: format!("Analysis failed: {}", e),
                    key_points: vec![UNAVAILABLE_KEY_POINT.to_string()],
                    sources: top_urls(request.results, MAX_SOURCES),
                    confidence: 0.0,
                    model_used: model.to_string(),
                    duration: start.elapsed().as_secs_f64(),
                }
            }
        }
    }

    async fn try_analyze(
        &self,
        request: &AnalysisRequest<'_>,
        model: &str,
        start: Instant,
    ) -> Result<AnalysisResult, AnalysisError> {
        if request.query.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest("query must not be empty".into()));
        }

        let prompt = build_prompt(request);
        if tracing::enabled!(Level::DEBUG) {
            debug!(prompt_tokens = ?count_tokens(&prompt), "Prepared analysis prompt");
        }

        let completion = self
            .provider
            .complete(&CompletionRequest {
                model: model.to_string(),
                messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
                temperature: ANALYSIS_TEMPERATURE,
                max_tokens: ANALYSIS_MAX_TOKENS,
            })
            .await?;

        let fallback_sources = top_urls(request.results, MAX_SOURCES);
        let extraction = self.extractor.extract(&completion.content, &fallback_sources);
        if !extraction.structured {
            debug!("Model answer was not structured, used fallback extraction");
        }
        let fields = ValidatedFields::try_from(extraction)?;

        Ok(AnalysisResult {
            query: request.query.to_string(),
            summary: fields.summary,
            key_points: fields.key_points,
            sources: fields.sources,
            confidence: fields.confidence,
            model_used: completion.model.unwrap_or_else(|| model.to_string()),
            duration: start.elapsed().as_secs_f64(),
        })
    }

    /// True when the default model answers a trivial prompt
    pub async fn health_check(&self) -> bool {
        let request = CompletionRequest {
            model: self.default_model.clone(),
            messages: vec![Message::user("Hello")],
            temperature: 0.1,
            max_tokens: 10,
        };
        match self.provider.complete(&request).await {
            Ok(completion) => !completion.content.is_empty(),
            Err(e) => {
                error!(error = %e, "AI service health check failed");
                false
            }
        }
    }
}

/// Extraction output checked against the analysis invariants
struct ValidatedFields {
    summary: String,
    key_points: Vec<String>,
    sources: Vec<String>,
    confidence: f64,
}

impl TryFrom<Extraction> for ValidatedFields {
    type Error = ParseError;

    fn try_from(extraction: Extraction) -> Result<Self, Self::Error> {
        let summary: String = match extraction.summary {
            Value::String(s) => s.chars().take(MAX_SUMMARY_CHARS).collect(),
            other => return Err(invalid("summary", "expected a string", &other)),
        };

        let mut key_points = string_list("key_points", extraction.key_points)?;
        key_points.truncate(MAX_KEY_POINTS);

        let mut sources = string_list("sources", extraction.sources)?;
        sources.truncate(MAX_SOURCES);

        let confidence = match extraction.confidence.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => c,
            _ => {
                return Err(invalid(
                    "confidence_score",
                    "expected a number between 0.0 and 1.0",
                    &extraction.confidence,
                ))
            }
        };

        Ok(Self {
            summary,
            key_points,
            sources,
            confidence,
        })
    }
}

fn string_list(field: &'static str, value: Value) -> Result<Vec<String>, ParseError> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(invalid(field, "expected a list of strings", &other)),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(invalid(field, "expected a list of strings", &other)),
        })
        .collect()
}

fn invalid(field: &'static str, expected: &str, got: &Value) -> ParseError {
    ParseError::InvalidField {
        field,
        reason: format!("{}, got {}", expected, got),
    }
}

fn build_prompt(request: &AnalysisRequest<'_>) -> String {
    let mut results_text = String::new();
    for (i, result) in request.results.iter().take(MAX_PROMPT_RESULTS).enumerate() {
        let content: String = result.content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
        results_text.push_str(&format!(
            "\n--- Result {} ---\nTitle: {}\nURL: {}\nContent: {}...\nEngine: {}\n",
            i + 1,
            result.title,
            result.url,
            content,
            result.engine
        ));
    }

    let context_addition = request
        .context
        .map(|context| format!("\nAdditional context: {}\n", context))
        .unwrap_or_default();

    format!(
        r#"
Please analyze the following search results for the query: "{query}"
{context_addition}
Search Results:
{results_text}

Please provide a comprehensive analysis in the following JSON format:
{{
    "summary": "A 2-3 sentence summary of the main findings",
    "key_points": ["Point 1", "Point 2", "Point 3", "Point 4", "Point 5"],
    "sources": ["URL1", "URL2", "URL3"],
    "confidence_score": 0.8
}}

Requirements:
- Summary should be factual and comprehensive
- Key points should be the most important insights from the search results
- Sources should be the 3 most relevant URLs
- Confidence score should reflect the quality and consistency of information (0.0-1.0)
- If information is conflicting or unclear, lower the confidence score
- If the search results are sparse, lower the confidence score
- Only include information that is actually present in the search results
"#,
        query = request.query,
    )
}

fn count_tokens(text: &str) -> Option<usize> {
    let bpe = cl100k_base().ok()?;
    Some(bpe.encode_with_special_tokens(text).len())
}
