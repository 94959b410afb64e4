// ============================================================================
// File: src/search.rs
// Cached search orchestration over a SearchProvider
// ============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::error::SearchUnavailable;
use crate::models::{RawSearchRecord, SearchQuery, SearchResultItem, SearchResultSet};
use crate::search_client::SearchProvider;

const CACHE_PREFIX: &str = "search:";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Result set plus whether it came from the cache
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: SearchResultSet,
    pub cached: bool,
}

pub struct SearchService {
    provider: Arc<dyn SearchProvider>,
    cache: Arc<dyn Cache>,
    max_results: usize,
    cache_ttl: Duration,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cache: Arc<dyn Cache>,
        max_results: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            max_results,
            cache_ttl,
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResultSet, SearchUnavailable> {
        self.search_with_status(query).await.map(|outcome| outcome.results)
    }

    pub async fn search_with_status(
        &self,
        query: &SearchQuery,
    ) -> Result<SearchOutcome, SearchUnavailable> {
        let start = Instant::now();
        let params = canonical_params(query);
        let cache_key = cache_key(&query.query, &params);

        if let Some(results) = self.cached(&cache_key).await {
            return Ok(SearchOutcome {
                results,
                cached: true,
            });
        }

        let records = self.provider.query(&params).await.map_err(|e| {
            error!(query = %query.query, error = %e, "SearXNG request failed");
            SearchUnavailable::from(e)
        })?;

        let mut results: Vec<SearchResultItem> = records.into_iter().map(map_record).collect();
        results.truncate(self.max_results);

        let engines_used: BTreeSet<String> = results.iter().map(|r| r.engine.clone()).collect();

        let result_set = SearchResultSet {
            query: query.query.clone(),
            total_results: results.len(),
            results,
            engines_used,
            search_duration: start.elapsed().as_secs_f64(),
        };

        self.store(&cache_key, &result_set).await;

        info!(
            query = %query.query,
            results_count = result_set.total_results,
            search_time = result_set.search_duration,
            "Search completed successfully"
        );

        Ok(SearchOutcome {
            results: result_set,
            cached: false,
        })
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    pub async fn cache_available(&self) -> bool {
        self.cache.is_available().await
    }

    async fn cached(&self, cache_key: &str) -> Option<SearchResultSet> {
        let raw = match self.cache.get(cache_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Cache retrieval failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(results) => {
                info!(cache_key, "Cache hit for search query");
                Some(results)
            }
            Err(e) => {
                warn!(cache_key, error = %e, "Ignoring undecodable cache entry");
                None
            }
        }
    }

    async fn store(&self, cache_key: &str, result_set: &SearchResultSet) {
        let payload = match serde_json::to_string(result_set) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Cache storage failed");
                return;
            }
        };

        match self.cache.set_with_expiry(cache_key, &payload, self.cache_ttl).await {
            Ok(()) => info!(cache_key, "Cached search results"),
            Err(e) => warn!(cache_key, error = %e, "Cache storage failed"),
        }
    }
}

/// Sorted SearXNG query parameters for a search
pub fn canonical_params(query: &SearchQuery) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("q".to_string(), query.query.clone());
    params.insert("format".to_string(), "json".to_string());
    params.insert("safesearch".to_string(), safesearch_level(&query.safe_search));
    params.insert("language".to_string(), query.language.clone());

    if let Some(categories) = query.categories.as_ref().filter(|c| !c.is_empty()) {
        params.insert("categories".to_string(), categories.join(","));
    }
    if let Some(engines) = query.engines.as_ref().filter(|e| !e.is_empty()) {
        params.insert("engines".to_string(), engines.join(","));
    }
    if let Some(time_range) = &query.time_range {
        params.insert("time_range".to_string(), time_range.clone());
    }
    params
}

fn safesearch_level(level: &str) -> String {
    match level {
        "off" => "0".to_string(),
        "moderate" => "1".to_string(),
        "strict" => "2".to_string(),
        other => other.to_string(),
    }
}

/// `search:` + SHA-256 of the query and its sorted parameters
pub fn cache_key(query: &str, params: &BTreeMap<String, String>) -> String {
    // A map of strings always serializes
    let params_json = serde_json::to_string(params).unwrap_or_default();
    let digest = Sha256::digest(format!("{}:{}", query, params_json).as_bytes());
    format!("{}{}", CACHE_PREFIX, hex::encode(digest))
}

fn map_record(record: RawSearchRecord) -> SearchResultItem {
    SearchResultItem {
        title: record.title.unwrap_or_default(),
        url: record.url.unwrap_or_default(),
        content: record.content.unwrap_or_default(),
        engine: record.engine.unwrap_or_else(|| "unknown".to_string()),
        score: record.score,
        published_at: record.published_date.as_deref().and_then(parse_date),
    }
}

/// First matching format wins; anything else is treated as undated
pub fn parse_date(date_str: &str) -> Option<NaiveDateTime> {
    if date_str.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date_str, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
