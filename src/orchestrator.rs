// ============================================================================
// File: src/orchestrator.rs
// Search followed by AI analysis, plus aggregate health
// ============================================================================

use chrono::Local;
use tracing::info;

use crate::analysis::AnalysisPipeline;
use crate::error::SearchUnavailable;
use crate::models::{AnalysisRequest, HealthReport, WebSearchRequest, WebSearchResponse};
use crate::search::SearchService;

pub struct SearchAgent {
    search: SearchService,
    analysis: AnalysisPipeline,
}

impl SearchAgent {
    pub fn new(search: SearchService, analysis: AnalysisPipeline) -> Self {
        Self { search, analysis }
    }

    pub fn analysis(&self) -> &AnalysisPipeline {
        &self.analysis
    }

    pub async fn run(&self, request: &WebSearchRequest) -> Result<WebSearchResponse, SearchUnavailable> {
        let timestamp = Local::now();

        info!(
            query = %request.search.query,
            analyze_with_ai = request.analyze,
            "Web search request received"
        );

        let outcome = self.search.search_with_status(&request.search).await?;

        let ai_analysis = if request.analyze && !outcome.results.results.is_empty() {
            let analysis_request = AnalysisRequest {
                query: &request.search.query,
                results: &outcome.results.results,
                context: request.context.as_deref(),
                model: request.model.as_deref(),
            };
            Some(self.analysis.analyze(&analysis_request).await)
        } else {
            None
        };

        info!(
            query = %request.search.query,
            results_count = outcome.results.total_results,
            cached = outcome.cached,
            has_ai_analysis = ai_analysis.is_some(),
            "Web search completed successfully"
        );

        Ok(WebSearchResponse {
            query: request.search.query.clone(),
            search_results: outcome.results,
            ai_analysis,
            cached: outcome.cached,
            timestamp,
        })
    }

    pub async fn health(&self) -> HealthReport {
        let (searxng, ai_analysis, cache) = tokio::join!(
            self.search.health_check(),
            self.analysis.health_check(),
            self.search.cache_available(),
        );

        let status = if searxng && ai_analysis && cache {
            "healthy"
        } else {
            "degraded"
        };

        HealthReport {
            status: status.to_string(),
            searxng,
            ai_analysis,
            cache,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache, NoCache};
    use crate::error::TransportError;
    use crate::extractor::HeuristicExtractor;
    use crate::llm_client::{Completion, CompletionRequest, TextCompletionProvider};
    use crate::models::{RawSearchRecord, SearchQuery};
    use crate::search_client::SearchProvider;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct StaticSearch(Vec<RawSearchRecord>);

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn query(
            &self,
            _params: &BTreeMap<String, String>,
        ) -> Result<Vec<RawSearchRecord>, TransportError> {
            Ok(self.0.clone())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct CountingModel(AtomicUsize);

    #[async_trait]
    impl TextCompletionProvider for CountingModel {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<Completion, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                content: "Findings are consistent.\n- Point one".to_string(),
                model: None,
            })
        }
    }

    fn agent(
        records: Vec<RawSearchRecord>,
        cache: Arc<dyn Cache>,
        model: Arc<CountingModel>,
    ) -> SearchAgent {
        let search = SearchService::new(
            Arc::new(StaticSearch(records)),
            cache,
            10,
            Duration::from_secs(60),
        );
        let analysis = AnalysisPipeline::new(model, Box::new(HeuristicExtractor), "deepseek-r1:7b");
        SearchAgent::new(search, analysis)
    }

    fn request(analyze: bool) -> WebSearchRequest {
        WebSearchRequest {
            search: SearchQuery::new("climate policy 2024"),
            analyze,
            context: None,
            model: None,
        }
    }

    fn record(url: &str) -> RawSearchRecord {
        RawSearchRecord {
            url: Some(url.to_string()),
            engine: Some("google".to_string()),
            ..RawSearchRecord::default()
        }
    }

    #[tokio::test]
    async fn analyzes_results_and_reports_cache_hits() {
        let model = Arc::new(CountingModel(AtomicUsize::new(0)));
        let cache = Arc::new(MemoryCache::new(NonZeroUsize::new(8).unwrap()));
        let agent = agent(vec![record("https://a.example")], cache, model.clone());

        let first = agent.run(&request(true)).await.unwrap();
        let analysis = first.ai_analysis.unwrap();
        assert_eq!(analysis.key_points, vec!["Point one"]);
        assert_eq!(analysis.sources, vec!["https://a.example"]);
        assert!(!first.cached);

        let second = agent.run(&request(true)).await.unwrap();
        assert!(second.cached);
        assert_eq!(model.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn skips_analysis_when_disabled_or_empty() {
        let model = Arc::new(CountingModel(AtomicUsize::new(0)));

        let with_results = agent(vec![record("https://a.example")], Arc::new(NoCache), model.clone());
        assert!(with_results.run(&request(false)).await.unwrap().ai_analysis.is_none());

        let empty = agent(vec![], Arc::new(NoCache), model.clone());
        let response = empty.run(&request(true)).await.unwrap();
        assert!(response.ai_analysis.is_none());
        assert_eq!(response.search_results.total_results, 0);

        assert_eq!(model.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_is_degraded_without_cache() {
        let model = Arc::new(CountingModel(AtomicUsize::new(0)));
        let report = agent(vec![], Arc::new(NoCache), model).health().await;
        assert!(report.searxng);
        assert!(report.ai_analysis);
        assert!(!report.cache);
        assert_eq!(report.status, "degraded");
    }
}
