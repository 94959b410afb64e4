// ============================================================================
// File: src/markdown.rs
// Markdown export of a search + analysis run
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::models::{AnalysisResult, SearchResultSet, WebSearchResponse};

pub struct ReportExporter<'a> {
    response: &'a WebSearchResponse,
}

impl<'a> ReportExporter<'a> {
    pub fn new(response: &'a WebSearchResponse) -> Self {
        Self { response }
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut content = String::new();

        self.write_header(&mut content);
        if let Some(analysis) = &self.response.ai_analysis {
            Self::write_analysis(&mut content, analysis);
        }
        Self::write_results(&mut content, &self.response.search_results);

        content
    }

    fn write_header(&self, content: &mut String) {
        let response = self.response;
        let _ = writeln!(content, "# Search: {}\n", response.query);
        let _ = writeln!(
            content,
            "**Date**: {}\n",
            response.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(
            content,
            "**Results**: {} from {} ({:.2}s{})\n",
            response.search_results.total_results,
            join_or_none(response.search_results.engines_used.iter().map(String::as_str)),
            response.search_results.search_duration,
            if response.cached { ", cached" } else { "" }
        );
    }

    fn write_analysis(content: &mut String, analysis: &AnalysisResult) {
        content.push_str("## Analysis\n\n");
        content.push_str(&analysis.summary);
        content.push_str("\n\n");

        if !analysis.key_points.is_empty() {
            content.push_str("### Key Points\n\n");
            for point in &analysis.key_points {
                let _ = writeln!(content, "- {}", point);
            }
            content.push('\n');
        }

        if !analysis.sources.is_empty() {
            content.push_str("### Sources\n\n");
            for source in &analysis.sources {
                let _ = writeln!(content, "- <{}>", source);
            }
            content.push('\n');
        }

        let _ = writeln!(
            content,
            "*Confidence {:.0}% · {} · {:.1}s*\n",
            analysis.confidence * 100.0,
            analysis.model_used,
            analysis.duration
        );
    }

    fn write_results(content: &mut String, results: &SearchResultSet) {
        content.push_str("## Results\n\n");
        for (i, result) in results.results.iter().enumerate() {
            let _ = writeln!(content, "{}. [{}]({}) · *{}*", i + 1, result.title, result.url, result.engine);
            if let Some(published) = result.published_at {
                let _ = writeln!(content, "   Published {}", published.format("%Y-%m-%d"));
            }
            if !result.content.is_empty() {
                let _ = writeln!(content, "   > {}", result.content.replace('\n', " "));
            }
        }
        content.push('\n');
    }
}

fn join_or_none<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "no engines".to_string()
    } else {
        joined
    }
}
