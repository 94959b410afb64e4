// ============================================================================
// File: src/catalog.rs
// Registry of candidate local models
// ============================================================================

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quantization {
    #[serde(rename = "q4_0")]
    Q4,
    #[serde(rename = "q8_0")]
    Q8,
}

impl Quantization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantization::Q4 => "q4_0",
            Quantization::Q8 => "q8_0",
        }
    }
}

/// Footprint and requirements of one model build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    pub size_gb: f64,
    pub min_ram_gb: f64,
    pub min_vram_gb: f64,
    /// Tokens
    pub max_context: u32,
    pub quantization: Quantization,
    pub recommended_batch_size: u32,
}

impl ModelProfile {
    /// "fast", "balanced" or "quality" by footprint
    pub fn performance_tier(&self) -> &'static str {
        if self.size_gb < 3.0 {
            "fast"
        } else if self.size_gb < 6.0 {
            "balanced"
        } else {
            "quality"
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    profiles: Vec<ModelProfile>,
}

impl ModelCatalog {
    pub fn new(profiles: Vec<ModelProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(anyhow!("Model catalog must contain at least one model"));
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            if !seen.insert(profile.name.as_str()) {
                return Err(anyhow!("Duplicate model '{}' in catalog", profile.name));
            }
        }

        Ok(Self { profiles })
    }

    /// Load a JSON array of profiles
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model catalog {}", path.display()))?;
        let profiles: Vec<ModelProfile> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model catalog {}", path.display()))?;
        Self::new(profiles)
    }

    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    pub fn find(&self, name: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(
    name: &str,
    size_gb: f64,
    min_ram_gb: f64,
    min_vram_gb: f64,
    max_context: u32,
    quantization: Quantization,
    recommended_batch_size: u32,
) -> ModelProfile {
    ModelProfile {
        name: name.to_string(),
        size_gb,
        min_ram_gb,
        min_vram_gb,
        max_context,
        quantization,
        recommended_batch_size,
    }
}

fn builtin_profiles() -> Vec<ModelProfile> {
    use Quantization::{Q4, Q8};
    vec![
        profile("deepseek-r1:1.5b-q4", 1.2, 4.0, 2.0, 8192, Q4, 8),
        profile("deepseek-r1:7b-q4", 4.1, 8.0, 5.0, 32768, Q4, 4),
        profile("deepseek-r1:7b-q8", 7.2, 12.0, 8.0, 32768, Q8, 2),
        profile("qwen2.5:7b-q4", 3.9, 8.0, 5.0, 131072, Q4, 4),
        profile("qwen2.5:14b-q4", 7.8, 16.0, 10.0, 131072, Q4, 2),
    ]
}
