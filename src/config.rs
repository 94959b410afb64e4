// ============================================================================
// File: src/config.rs
// Configuration structures and validation
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure loaded from config.json
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Base URL for your SearXNG instance (e.g., "http://localhost:8080")
    pub searxng_url: String,

    /// Optional bearer token for SearXNG (if your instance requires authentication)
    pub searxng_api_key: Option<String>,

    /// Base URL of the Ollama server
    pub ollama_url: String,

    /// Model used when a request does not name one
    pub default_model: String,

    pub search: SearchSettings,

    pub analysis: AnalysisSettings,

    pub cache: CacheSettings,

    /// Optional JSON file replacing the built-in model catalog
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchSettings {
    /// Results kept per search
    pub max_results: usize,

    /// Seconds a cached result set stays valid
    pub cache_ttl_secs: u64,

    /// Request timeout for SearXNG calls, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Request timeout for completion calls, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Disk,
    Memory,
    Off,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,

    /// Directory for the disk cache; defaults to the user cache dir
    pub dir: Option<PathBuf>,

    /// Entries held by the memory cache
    pub capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            searxng_url: "http://localhost:8080".to_string(),
            searxng_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            default_model: "deepseek-r1:7b".to_string(),
            search: SearchSettings::default(),
            analysis: AnalysisSettings::default(),
            cache: CacheSettings::default(),
            catalog_path: None,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 10,
            cache_ttl_secs: 3600,
            timeout_secs: 30,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Disk,
            dir: None,
            capacity: 256,
        }
    }
}

impl Config {
    /// Load from a JSON file, or fall back to defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.searxng_url.trim().is_empty() {
            return Err(anyhow!("SearXNG URL is required"));
        }

        if self.ollama_url.trim().is_empty() {
            return Err(anyhow!("Ollama URL is required"));
        }

        if self.default_model.trim().is_empty() {
            return Err(anyhow!("A default model is required"));
        }

        if self.search.max_results == 0 {
            return Err(anyhow!("search.max_results must be at least 1"));
        }

        if self.search.timeout_secs == 0 || self.analysis.timeout_secs == 0 {
            return Err(anyhow!("Timeouts must be at least one second"));
        }

        if self.cache.backend == CacheBackend::Memory && self.cache.capacity == 0 {
            return Err(anyhow!("cache.capacity must be at least 1 for the memory cache"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.search.cache_ttl_secs, 3600);
        assert_eq!(config.search.timeout_secs, 30);
        assert_eq!(config.analysis.timeout_secs, 60);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "default_model": "qwen2.5:7b", "search": { "max_results": 5 }, "cache": { "backend": "off" } }"#,
        )
        .unwrap();

        assert_eq!(config.default_model, "qwen2.5:7b");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.cache_ttl_secs, 3600);
        assert_eq!(config.cache.backend, CacheBackend::Off);
        assert_eq!(config.searxng_url, "http://localhost:8080");
    }

    #[test]
    fn rejects_zero_results() {
        let mut config = Config::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn example_config_loads_and_validates() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.json");
        let config = Config::load(Some(&path)).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Disk);
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.ollama_url, "http://localhost:11434");
    }
}
