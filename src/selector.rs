// ============================================================================
// File: src/selector.rs
// Resource-aware model recommendation
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::catalog::{ModelCatalog, ModelProfile, Quantization};
use crate::resources::{ResourceProbe, ResourceSnapshot};

/// Largest model, in GB, considered runnable without a GPU
const CPU_ONLY_MAX_SIZE_GB: f64 = 2.0;
const MAX_RECOMMENDATIONS: usize = 3;
const MAX_CONTEXT_WINDOW: u32 = 8192;
const MAX_THREADS: usize = 8;
const LOW_VRAM_GB: f64 = 8.0;
const LARGE_GPU_GB: f64 = 16.0;
const LONG_CONTEXT_ROPE_BASE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceProfile {
    Speed,
    Balanced,
    Quality,
}

impl PerformanceProfile {
    /// Largest footprint (GB) and lowest quantization the tier accepts
    pub fn constraints(self) -> (f64, Quantization) {
        match self {
            PerformanceProfile::Speed => (2.0, Quantization::Q4),
            PerformanceProfile::Balanced => (5.0, Quantization::Q4),
            PerformanceProfile::Quality => (10.0, Quantization::Q8),
        }
    }
}

impl fmt::Display for PerformanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PerformanceProfile::Speed => "speed",
            PerformanceProfile::Balanced => "balanced",
            PerformanceProfile::Quality => "quality",
        };
        f.write_str(name)
    }
}

impl FromStr for PerformanceProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "speed" => Ok(PerformanceProfile::Speed),
            "balanced" => Ok(PerformanceProfile::Balanced),
            "quality" => Ok(PerformanceProfile::Quality),
            other => Err(format!(
                "unknown performance profile '{}' (expected speed, balanced or quality)",
                other
            )),
        }
    }
}

/// Ollama runtime options for one model on one machine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeConfig {
    pub num_ctx: u32,
    pub num_thread: usize,
    pub num_gpu: usize,
    pub low_vram: bool,
    pub num_batch: u32,
    pub f16_kv: bool,
    pub use_mlock: bool,
    pub use_mmap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rope_frequency_base: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub model: ModelProfile,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemAnalysis {
    pub ram_category: &'static str,
    pub gpu_available: bool,
    pub gpu_memory_total: f64,
    pub recommended_model_size: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedModel {
    pub name: String,
    pub size_gb: f64,
    pub context_length: u32,
    pub quantization: Quantization,
    pub estimated_speed: &'static str,
    pub ollama_config: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemOptimizations {
    pub suggested_swap_gb: f64,
    pub cpu_affinity: Vec<usize>,
    pub memory_pressure: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub target_performance: PerformanceProfile,
    pub system_specs: ResourceSnapshot,
    pub recommended_models: Vec<RankedModel>,
    pub system_optimizations: SystemOptimizations,
}

pub struct ModelSelector {
    catalog: ModelCatalog,
    probe: Arc<dyn ResourceProbe>,
}

impl ModelSelector {
    pub fn new(catalog: ModelCatalog, probe: Arc<dyn ResourceProbe>) -> Self {
        Self { catalog, probe }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        self.probe.snapshot()
    }

    /// Up to three models that fit this machine, best first
    pub fn recommend(&self, profile: PerformanceProfile) -> Vec<Recommendation> {
        let specs = self.probe.snapshot();
        let recommendations = recommend_for(&self.catalog, &specs, profile);
        info!(
            target = %profile,
            system_ram = specs.ram_gb,
            recommended = recommendations.len(),
            "Performance recommendations computed"
        );
        recommendations
    }

    pub fn optimization_report(&self, profile: PerformanceProfile) -> OptimizationReport {
        let specs = self.probe.snapshot();
        let recommended_models = recommend_for(&self.catalog, &specs, profile)
            .into_iter()
            .map(|rec| RankedModel {
                estimated_speed: estimated_speed(rec.model.size_gb),
                name: rec.model.name,
                size_gb: rec.model.size_gb,
                context_length: rec.model.max_context,
                quantization: rec.model.quantization,
                ollama_config: rec.runtime,
            })
            .collect();

        OptimizationReport {
            target_performance: profile,
            system_optimizations: system_optimizations(&specs),
            recommended_models,
            system_specs: specs,
        }
    }
}

/// Pure ranking over an explicit snapshot
pub fn recommend_for(
    catalog: &ModelCatalog,
    specs: &ResourceSnapshot,
    profile: PerformanceProfile,
) -> Vec<Recommendation> {
    let mut eligible: Vec<&ModelProfile> = catalog
        .profiles()
        .iter()
        .filter(|model| is_eligible(model, specs, profile))
        .collect();

    eligible.sort_by(|a, b| {
        performance_score(b)
            .partial_cmp(&performance_score(a))
            .unwrap_or(Ordering::Equal)
    });

    eligible
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|model| Recommendation {
            runtime: runtime_config(model, specs),
            model: model.clone(),
        })
        .collect()
}

fn is_eligible(model: &ModelProfile, specs: &ResourceSnapshot, profile: PerformanceProfile) -> bool {
    let (max_size_gb, min_quantization) = profile.constraints();

    if model.min_ram_gb > specs.ram_gb
        || model.size_gb > max_size_gb
        || model.quantization < min_quantization
    {
        return false;
    }

    if specs.gpus.is_empty() {
        model.size_gb <= CPU_ONLY_MAX_SIZE_GB
    } else {
        specs.gpus.iter().any(|gpu| gpu.memory_gb >= model.min_vram_gb)
    }
}

/// Rewards context length and quantization fidelity, penalizes size
pub fn performance_score(model: &ModelProfile) -> f64 {
    let context_bonus = (f64::from(model.max_context) / 32768.0).min(2.0);
    let quantization_bonus = match model.quantization {
        Quantization::Q4 => 1.0,
        Quantization::Q8 => 1.2,
    };
    context_bonus * quantization_bonus - model.size_gb / 10.0
}

pub fn runtime_config(model: &ModelProfile, specs: &ResourceSnapshot) -> RuntimeConfig {
    let mut config = RuntimeConfig {
        num_ctx: model.max_context.min(MAX_CONTEXT_WINDOW),
        num_thread: specs.cpu_count.min(MAX_THREADS),
        num_gpu: specs.gpus.len(),
        low_vram: specs
            .gpus
            .first()
            .map_or(true, |gpu| gpu.memory_gb < LOW_VRAM_GB),
        num_batch: model.recommended_batch_size,
        f16_kv: true,
        use_mlock: true,
        use_mmap: true,
        rope_frequency_base: None,
    };

    if let Some(gpu) = specs.gpus.first() {
        if gpu.memory_gb >= LARGE_GPU_GB {
            config.num_batch = model.recommended_batch_size * 2;
            config.rope_frequency_base = Some(LONG_CONTEXT_ROPE_BASE);
        } else {
            config.low_vram = true;
        }
    }

    config
}

pub fn system_analysis(specs: &ResourceSnapshot) -> SystemAnalysis {
    let tier = |large: &'static str, medium: &'static str, small: &'static str| {
        if specs.ram_gb >= 32.0 {
            large
        } else if specs.ram_gb >= 16.0 {
            medium
        } else {
            small
        }
    };

    SystemAnalysis {
        ram_category: tier("high", "medium", "low"),
        gpu_available: !specs.gpus.is_empty(),
        gpu_memory_total: specs.gpus.iter().map(|gpu| gpu.memory_gb).sum(),
        recommended_model_size: tier("large", "medium", "small"),
    }
}

pub fn system_optimizations(specs: &ResourceSnapshot) -> SystemOptimizations {
    SystemOptimizations {
        suggested_swap_gb: (specs.ram_gb * 0.1).max(4.0),
        cpu_affinity: (0..specs.cpu_count.min(MAX_THREADS)).collect(),
        memory_pressure: if specs.ram_gb < 16.0 {
            "high"
        } else if specs.ram_gb < 32.0 {
            "medium"
        } else {
            "low"
        },
    }
}

fn estimated_speed(size_gb: f64) -> &'static str {
    if size_gb < 3.0 {
        "Fast"
    } else if size_gb < 6.0 {
        "Medium"
    } else {
        "Slow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::GpuInfo;

    struct FixedProbe(ResourceSnapshot);

    impl ResourceProbe for FixedProbe {
        fn snapshot(&self) -> ResourceSnapshot {
            self.0.clone()
        }
    }

    fn specs(ram_gb: f64, gpu_memory: &[f64]) -> ResourceSnapshot {
        ResourceSnapshot {
            ram_gb,
            cpu_count: 16,
            cpu_freq_ghz: 3.5,
            gpus: gpu_memory
                .iter()
                .enumerate()
                .map(|(i, memory_gb)| GpuInfo {
                    name: format!("GPU {}", i),
                    memory_gb: *memory_gb,
                    utilization: 0.0,
                })
                .collect(),
        }
    }

    fn selector(specs: ResourceSnapshot) -> ModelSelector {
        ModelSelector::new(ModelCatalog::builtin(), Arc::new(FixedProbe(specs)))
    }

    fn names(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.model.name.as_str()).collect()
    }

    const ALL_PROFILES: [PerformanceProfile; 3] = [
        PerformanceProfile::Speed,
        PerformanceProfile::Balanced,
        PerformanceProfile::Quality,
    ];

    #[test]
    fn cpu_only_machine_gets_small_models_under_any_profile() {
        let selector = selector(specs(8.0, &[]));
        for profile in ALL_PROFILES {
            for rec in selector.recommend(profile) {
                assert!(rec.model.size_gb <= 2.0);
                assert!(rec.model.min_ram_gb <= 8.0);
            }
        }
        assert_eq!(
            names(&selector.recommend(PerformanceProfile::Balanced)),
            vec!["deepseek-r1:1.5b-q4"]
        );
        assert!(selector.recommend(PerformanceProfile::Quality).is_empty());
    }

    #[test]
    fn speed_never_exceeds_two_gb() {
        let selector = selector(specs(64.0, &[24.0]));
        let recs = selector.recommend(PerformanceProfile::Speed);
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.model.size_gb <= 2.0));
    }

    #[test]
    fn quality_only_returns_eight_bit_models() {
        let selector = selector(specs(64.0, &[24.0]));
        let recs = selector.recommend(PerformanceProfile::Quality);
        assert_eq!(names(&recs), vec!["deepseek-r1:7b-q8"]);
        assert!(recs.iter().all(|r| r.model.quantization == Quantization::Q8));
    }

    #[test]
    fn balanced_ranks_by_score() {
        let selector = selector(specs(32.0, &[12.0]));
        let recs = selector.recommend(PerformanceProfile::Balanced);
        // qwen2.5:7b-q4 = 2.0 - 0.39, deepseek-r1:7b-q4 = 1.0 - 0.41, 1.5b = 0.25 - 0.12
        assert_eq!(
            names(&recs),
            vec!["qwen2.5:7b-q4", "deepseek-r1:7b-q4", "deepseek-r1:1.5b-q4"]
        );
    }

    #[test]
    fn gpu_must_fit_minimum_vram() {
        let selector = selector(specs(32.0, &[4.0]));
        let recs = selector.recommend(PerformanceProfile::Balanced);
        assert_eq!(names(&recs), vec!["deepseek-r1:1.5b-q4"]);
    }

    #[test]
    fn returns_empty_when_nothing_fits() {
        let selector = selector(specs(2.0, &[]));
        assert!(selector.recommend(PerformanceProfile::Balanced).is_empty());
    }

    #[test]
    fn score_formula() {
        let catalog = ModelCatalog::builtin();
        let q8 = catalog.find("deepseek-r1:7b-q8").unwrap();
        assert!((performance_score(q8) - (1.0 * 1.2 - 0.72)).abs() < 1e-9);
        let long = catalog.find("qwen2.5:14b-q4").unwrap();
        assert!((performance_score(long) - (2.0 - 0.78)).abs() < 1e-9);
    }

    #[test]
    fn runtime_config_without_gpu() {
        let catalog = ModelCatalog::builtin();
        let model = catalog.find("deepseek-r1:1.5b-q4").unwrap();
        let mut machine = specs(8.0, &[]);
        machine.cpu_count = 4;

        let config = runtime_config(model, &machine);
        assert_eq!(config.num_ctx, 8192);
        assert_eq!(config.num_thread, 4);
        assert_eq!(config.num_gpu, 0);
        assert!(config.low_vram);
        assert_eq!(config.num_batch, 8);
        assert!(config.f16_kv && config.use_mlock && config.use_mmap);
        assert!(config.rope_frequency_base.is_none());
    }

    #[test]
    fn runtime_config_with_large_gpu_doubles_batch() {
        let catalog = ModelCatalog::builtin();
        let model = catalog.find("qwen2.5:7b-q4").unwrap();

        let config = runtime_config(model, &specs(64.0, &[24.0, 8.0]));
        assert_eq!(config.num_ctx, 8192);
        assert_eq!(config.num_thread, 8);
        assert_eq!(config.num_gpu, 2);
        assert!(!config.low_vram);
        assert_eq!(config.num_batch, 8);
        assert_eq!(config.rope_frequency_base, Some(1_000_000.0));
    }

    #[test]
    fn runtime_config_with_mid_gpu_forces_low_vram() {
        let catalog = ModelCatalog::builtin();
        let model = catalog.find("deepseek-r1:7b-q4").unwrap();

        let config = runtime_config(model, &specs(32.0, &[12.0]));
        assert!(config.low_vram);
        assert_eq!(config.num_batch, 4);
    }

    #[test]
    fn runtime_config_serializes_with_ollama_names() {
        let catalog = ModelCatalog::builtin();
        let model = catalog.find("deepseek-r1:1.5b-q4").unwrap();
        let json = serde_json::to_value(runtime_config(model, &specs(8.0, &[]))).unwrap();
        assert_eq!(json["num_ctx"], 8192);
        assert_eq!(json["f16_kv"], true);
        assert!(json.get("rope_frequency_base").is_none());
    }

    #[test]
    fn profile_parsing() {
        assert_eq!(
            "Quality".parse::<PerformanceProfile>(),
            Ok(PerformanceProfile::Quality)
        );
        assert!("turbo".parse::<PerformanceProfile>().is_err());
        assert_eq!(PerformanceProfile::Speed.to_string(), "speed");
    }

    #[test]
    fn system_analysis_thresholds() {
        let low = system_analysis(&specs(8.0, &[]));
        assert_eq!(low.ram_category, "low");
        assert_eq!(low.recommended_model_size, "small");
        assert!(!low.gpu_available);

        let high = system_analysis(&specs(64.0, &[24.0, 8.0]));
        assert_eq!(high.ram_category, "high");
        assert_eq!(high.recommended_model_size, "large");
        assert_eq!(high.gpu_memory_total, 32.0);
    }

    #[test]
    fn optimization_report_uses_target() {
        let selector = selector(specs(24.0, &[]));
        let report = selector.optimization_report(PerformanceProfile::Speed);

        assert_eq!(report.target_performance, PerformanceProfile::Speed);
        assert_eq!(report.recommended_models.len(), 1);
        assert_eq!(report.recommended_models[0].estimated_speed, "Fast");
        assert_eq!(report.system_optimizations.suggested_swap_gb, 4.0);
        assert_eq!(report.system_optimizations.cpu_affinity, (0..8).collect::<Vec<_>>());
        assert_eq!(report.system_optimizations.memory_pressure, "medium");
    }
}
