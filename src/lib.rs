// ============================================================================
// File: src/lib.rs
// Search, analysis and model-selection core behind the search-agent CLI
// ============================================================================

pub mod analysis;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod llm_client;
pub mod markdown;
pub mod models;
pub mod orchestrator;
pub mod resources;
pub mod search;
pub mod search_client;
pub mod selector;
