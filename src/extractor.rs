// ============================================================================
// File: src/extractor.rs
// Structured extraction from free-form model output
// ============================================================================

use serde_json::{json, Map, Value};
use tracing::warn;

pub const MAX_SUMMARY_CHARS: usize = 500;
pub const MAX_KEY_POINTS: usize = 5;
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

const REQUIRED_KEYS: [&str; 4] = ["summary", "key_points", "sources", "confidence_score"];
const SUMMARY_LINES: usize = 5;
const EMPTY_SUMMARY: &str = "Analysis completed successfully.";
const BULLET_CHARS: &str = "•-*0123456789. ";

/// Fields pulled out of a model answer.
///
/// Values stay as JSON so a structured answer is passed on exactly as the
/// model produced it; type and range checks happen in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub summary: Value,
    pub key_points: Value,
    pub sources: Value,
    pub confidence: Value,
    /// False when the heuristic fallback produced the fields
    pub structured: bool,
}

/// Turns raw completion text into an [`Extraction`]. Must not fail.
pub trait ResponseExtractor: Send + Sync {
    fn extract(&self, raw_text: &str, fallback_sources: &[String]) -> Extraction;
}

/// Takes the outermost `{ ... }` span as JSON, falling back to line heuristics
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

impl ResponseExtractor for HeuristicExtractor {
    fn extract(&self, raw_text: &str, fallback_sources: &[String]) -> Extraction {
        if let Some(mut fields) = structured_fields(raw_text) {
            let mut take = |key: &str| fields.remove(key).unwrap_or(Value::Null);
            return Extraction {
                summary: take("summary"),
                key_points: take("key_points"),
                sources: take("sources"),
                confidence: take("confidence_score"),
                structured: true,
            };
        }

        Extraction {
            summary: Value::String(fallback_summary(raw_text)),
            key_points: json!(fallback_key_points(raw_text)),
            sources: json!(fallback_sources),
            confidence: json!(DEFAULT_CONFIDENCE),
            structured: false,
        }
    }
}

fn structured_fields(raw_text: &str) -> Option<Map<String, Value>> {
    let start = raw_text.find('{')?;
    let end = raw_text.rfind('}')?;
    if end <= start {
        return None;
    }

    let candidate = &raw_text[start..=end];
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) if REQUIRED_KEYS.iter().all(|k| map.contains_key(*k)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            warn!(
                error = %e,
                response = %raw_text.chars().take(200).collect::<String>(),
                "Failed to parse AI response as JSON"
            );
            None
        }
    }
}

fn fallback_summary(raw_text: &str) -> String {
    let kept: Vec<&str> = raw_text
        .split('\n')
        .take(SUMMARY_LINES)
        .filter(|line| !line.trim().is_empty() && !line.starts_with('{') && !line.starts_with('['))
        .map(str::trim)
        .collect();

    if kept.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }
    kept.join(" ").chars().take(MAX_SUMMARY_CHARS).collect()
}

fn fallback_key_points(raw_text: &str) -> Vec<String> {
    raw_text
        .split('\n')
        .map(str::trim)
        .filter(|line| is_list_item(line))
        .map(|line| line.trim_start_matches(|c| BULLET_CHARS.contains(c)))
        .filter(|point| !point.is_empty())
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect()
}

fn is_list_item(line: &str) -> bool {
    if line.starts_with(['•', '-', '*']) {
        return true;
    }
    let mut chars = line.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('1'..='9'), Some('.'))
    )
}
