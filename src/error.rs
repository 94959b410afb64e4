// ============================================================================
// File: src/error.rs
// Error kinds shared by the search, analysis and cache layers
// ============================================================================

use thiserror::Error;

/// Failure reaching an external provider (SearXNG or the completion endpoint)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Network(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// The only error search orchestration surfaces to its callers
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct SearchUnavailable {
    pub detail: String,
}

impl From<TransportError> for SearchUnavailable {
    fn from(err: TransportError) -> Self {
        let detail = match err {
            TransportError::Status { status, .. } => format!("Search service error: {}", status),
            TransportError::Network(msg) => format!("Search service unavailable: {}", msg),
            TransportError::Decode(msg) => format!("Search failed: {}", msg),
        };
        Self { detail }
    }
}

/// Cache failures. Callers log these and carry on without the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be encoded: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A model answer that decoded but does not fit the analysis shape
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid `{field}` in model output: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Internal to the analysis pipeline; rendered into the degraded result
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    InvalidOutput(#[from] ParseError),
}
