// ============================================================================
// File: src/main.rs
// Entry point and CLI handling
// ============================================================================

use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use ai_search_agent::analysis::AnalysisPipeline;
use ai_search_agent::cache::{Cache, DiskCache, MemoryCache, NoCache};
use ai_search_agent::catalog::ModelCatalog;
use ai_search_agent::config::{CacheBackend, Config};
use ai_search_agent::extractor::HeuristicExtractor;
use ai_search_agent::llm_client::OllamaClient;
use ai_search_agent::markdown::ReportExporter;
use ai_search_agent::models::{AnalysisRequest, AnalysisResult, SearchQuery, SearchResultSet, WebSearchRequest, WebSearchResponse};
use ai_search_agent::orchestrator::SearchAgent;
use ai_search_agent::resources::SystemProbe;
use ai_search_agent::search::SearchService;
use ai_search_agent::search_client::SearxngClient;
use ai_search_agent::selector::{system_analysis, ModelSelector, PerformanceProfile};

/// Web search through SearXNG with analysis by a local LLM
#[derive(Parser, Debug)]
#[command(name = "search-agent", version)]
#[command(about = "Privacy-focused web search with local LLM analysis", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, env = "SEARCH_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the SearXNG base URL
    #[arg(long, global = true, env = "SEARXNG_URL")]
    searxng_url: Option<String>,

    /// Override the Ollama base URL
    #[arg(long, global = true, env = "OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the web and analyze the results
    Search {
        query: String,

        /// Skip the AI analysis
        #[arg(long)]
        no_analyze: bool,

        /// Model to analyze with
        #[arg(short, long)]
        model: Option<String>,

        /// Extra context for the analysis
        #[arg(long)]
        context: Option<String>,

        #[arg(long = "category")]
        categories: Vec<String>,

        #[arg(long = "engine")]
        engines: Vec<String>,

        /// day, week, month or year
        #[arg(long)]
        time_range: Option<String>,

        #[arg(long, default_value = "en")]
        language: String,

        /// off, moderate or strict
        #[arg(long, default_value = "moderate")]
        safe_search: String,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,

        /// Write a Markdown report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze a saved result set (JSON from `search --json`)
    Analyze {
        input: PathBuf,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        context: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Recommend models for this machine
    Recommend {
        /// speed, balanced or quality
        #[arg(short, long, default_value = "balanced")]
        target: PerformanceProfile,

        #[arg(long)]
        json: bool,
    },

    /// Show system specifications
    System {
        #[arg(long)]
        json: bool,
    },

    /// List the model catalog, or show one model
    Models {
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Check SearXNG, the model server and the cache
    Health {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = args.searxng_url {
        config.searxng_url = url;
    }
    if let Some(url) = args.ollama_url {
        config.ollama_url = url;
    }
    config.validate()?;

    match args.command {
        Command::Search {
            query,
            no_analyze,
            model,
            context,
            categories,
            engines,
            time_range,
            language,
            safe_search,
            json,
            output,
        } => {
            let request = WebSearchRequest {
                search: SearchQuery {
                    query,
                    categories: non_empty(categories),
                    engines: non_empty(engines),
                    safe_search,
                    time_range,
                    language,
                },
                analyze: !no_analyze,
                context,
                model,
            };

            let agent = build_agent(&config).await?;
            let spinner = spinner(if request.analyze { "Searching and analyzing..." } else { "Searching..." });
            let response = agent.run(&request).await;
            spinner.finish_and_clear();
            let response = response?;

            if json {
                print_json(&response)?;
            } else {
                display_response(&response);
            }

            if let Some(path) = output {
                ReportExporter::new(&response).export(&path)?;
                eprintln!("\n{} Report exported to: {}", "✓".green().bold(), path.display().to_string().bright_cyan());
            }
        }

        Command::Analyze { input, model, context, json } => {
            let content = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let results = parse_result_set(&content)
                .with_context(|| format!("Failed to parse result set in {}", input.display()))?;

            let pipeline = build_pipeline(&config)?;
            let request = AnalysisRequest {
                query: &results.query,
                results: &results.results,
                context: context.as_deref(),
                model: model.as_deref(),
            };

            let spinner = spinner("Analyzing...");
            let analysis = pipeline.analyze(&request).await;
            spinner.finish_and_clear();

            if json {
                print_json(&analysis)?;
            } else {
                display_analysis(&analysis);
            }
        }

        Command::Recommend { target, json } => {
            let selector = build_selector(&config)?;
            let report = selector.optimization_report(target);

            if json {
                print_json(&report)?;
            } else {
                println!("\n{} {}", "Target:".green().bold(), target);
                if report.recommended_models.is_empty() {
                    println!("{} No catalog model fits this machine for the '{}' profile", "⚠".yellow(), target);
                }
                for (i, model) in report.recommended_models.iter().enumerate() {
                    println!(
                        "\n{} {} {}",
                        format!("{}.", i + 1).bright_cyan(),
                        model.name.bright_white().bold(),
                        format!("({:.1} GB, {}, {} ctx, {})", model.size_gb, model.quantization.as_str(), model.context_length, model.estimated_speed).bright_black()
                    );
                    let cfg = &model.ollama_config;
                    println!(
                        "   num_ctx={} num_thread={} num_gpu={} num_batch={} low_vram={}",
                        cfg.num_ctx, cfg.num_thread, cfg.num_gpu, cfg.num_batch, cfg.low_vram
                    );
                }
                let opts = &report.system_optimizations;
                println!(
                    "\n{} swap {:.1} GB, cores {:?}, memory pressure {}",
                    "Suggestions:".green().bold(),
                    opts.suggested_swap_gb,
                    opts.cpu_affinity,
                    opts.memory_pressure
                );
            }
        }

        Command::System { json } => {
            let selector = build_selector(&config)?;
            let specs = selector.snapshot();
            let analysis = system_analysis(&specs);

            if json {
                print_json(&serde_json::json!({
                    "system_specifications": specs,
                    "performance_analysis": analysis,
                }))?;
            } else {
                println!("\n{} {:.1} GB ({})", "RAM:".green().bold(), specs.ram_gb, analysis.ram_category);
                println!("{} {} logical cores @ {:.2} GHz", "CPU:".green().bold(), specs.cpu_count, specs.cpu_freq_ghz);
                if specs.gpus.is_empty() {
                    println!("{} none detected", "GPU:".green().bold());
                }
                for gpu in &specs.gpus {
                    println!("{} {} ({:.1} GB, {:.0}% busy)", "GPU:".green().bold(), gpu.name, gpu.memory_gb, gpu.utilization);
                }
                println!("{} {}", "Recommended model size:".green().bold(), analysis.recommended_model_size);
            }
        }

        Command::Models { name, json } => {
            let catalog = load_catalog(&config)?;
            let selected = match &name {
                Some(name) => vec![catalog
                    .find(name)
                    .ok_or_else(|| anyhow!("Unknown model '{}'", name))?
                    .clone()],
                None => catalog.profiles().to_vec(),
            };

            if json {
                let models: Vec<_> = selected
                    .iter()
                    .map(|p| serde_json::json!({ "model": p, "performance_tier": p.performance_tier() }))
                    .collect();
                print_json(&models)?;
            } else {
                for p in &selected {
                    println!(
                        "{} {} {}",
                        "●".bright_cyan(),
                        p.name.bright_white().bold(),
                        format!(
                            "{:.1} GB, RAM ≥{} GB, VRAM ≥{} GB, {} ctx, {}, batch {}, {}",
                            p.size_gb, p.min_ram_gb, p.min_vram_gb, p.max_context,
                            p.quantization.as_str(), p.recommended_batch_size, p.performance_tier()
                        )
                        .bright_black()
                    );
                }
            }
        }

        Command::Health { json } => {
            let agent = build_agent(&config).await?;
            let report = agent.health().await;

            if json {
                print_json(&report)?;
            } else {
                let mark = |ok: bool| if ok { "✓".green().bold() } else { "✗".red().bold() };
                println!("{} SearXNG ({})", mark(report.searxng), config.searxng_url);
                println!("{} Model server ({}, {})", mark(report.ai_analysis), config.ollama_url, agent.analysis().default_model());
                println!("{} Cache", mark(report.cache));
                println!("\n{}: {}", "Status".green().bold(), report.status);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_agent(config: &Config) -> Result<SearchAgent> {
    let provider = SearxngClient::new(
        &config.searxng_url,
        config.searxng_api_key.clone(),
        Duration::from_secs(config.search.timeout_secs),
    )?;
    let search = SearchService::new(
        Arc::new(provider),
        build_cache(config).await,
        config.search.max_results,
        Duration::from_secs(config.search.cache_ttl_secs),
    );
    Ok(SearchAgent::new(search, build_pipeline(config)?))
}

fn build_pipeline(config: &Config) -> Result<AnalysisPipeline> {
    let client = OllamaClient::new(&config.ollama_url, Duration::from_secs(config.analysis.timeout_secs))?;
    Ok(AnalysisPipeline::new(
        Arc::new(client),
        Box::new(HeuristicExtractor),
        config.default_model.clone(),
    ))
}

async fn build_cache(config: &Config) -> Arc<dyn Cache> {
    match config.cache.backend {
        CacheBackend::Off => Arc::new(NoCache),
        CacheBackend::Memory => match NonZeroUsize::new(config.cache.capacity) {
            Some(capacity) => Arc::new(MemoryCache::new(capacity)),
            None => Arc::new(NoCache),
        },
        CacheBackend::Disk => {
            let Some(dir) = config.cache.dir.clone().or_else(DiskCache::default_dir) else {
                warn!("No cache directory available, caching disabled");
                return Arc::new(NoCache);
            };
            let cache = DiskCache::new(dir);
            if !cache.is_available().await {
                warn!(dir = %cache.dir().display(), "Cache directory not writable, caching disabled");
                return Arc::new(NoCache);
            }
            match cache.prune_expired().await {
                Ok(removed) => debug!(dir = %cache.dir().display(), removed, "Using disk cache"),
                Err(e) => warn!(dir = %cache.dir().display(), error = %e, "Failed to prune disk cache"),
            }
            Arc::new(cache)
        }
    }
}

fn load_catalog(config: &Config) -> Result<ModelCatalog> {
    match &config.catalog_path {
        Some(path) => ModelCatalog::from_file(path),
        None => Ok(ModelCatalog::builtin()),
    }
}

fn build_selector(config: &Config) -> Result<ModelSelector> {
    Ok(ModelSelector::new(load_catalog(config)?, Arc::new(SystemProbe)))
}

/// Accepts either a bare result set or a full `search --json` response
fn parse_result_set(content: &str) -> Result<SearchResultSet> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let value = match value.get("search_results") {
        Some(inner) => inner.clone(),
        None => value,
    };
    serde_json::from_value(value).map_err(|e| anyhow!("not a search result set: {}", e))
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_response(response: &WebSearchResponse) {
    let results = &response.search_results;

    println!("{}", "\n═══════════════════════════════════════".bright_blue());
    println!("{} {}", "Query:".green().bold(), response.query);
    println!(
        "{} {} result(s) from {} in {:.2}s{}",
        "Search:".green().bold(),
        results.total_results,
        results.engines_used.iter().cloned().collect::<Vec<_>>().join(", "),
        results.search_duration,
        if response.cached { " (cached)".bright_black().to_string() } else { String::new() }
    );
    println!("{}", "═══════════════════════════════════════".bright_blue());

    if let Some(analysis) = &response.ai_analysis {
        display_analysis(analysis);
    }

    println!("\n{}", "Results".bright_white().bold());
    println!("{}", "─".repeat(40).bright_black());
    for (i, result) in results.results.iter().enumerate() {
        println!("{} {}", format!("{:>2}.", i + 1).bright_cyan(), result.title.bold());
        println!("    {} {}", result.url.bright_blue(), format!("[{}]", result.engine).bright_black());
    }
}

fn display_analysis(analysis: &AnalysisResult) {
    let confidence = format!("{:.0}%", analysis.confidence * 100.0);
    let confidence = if analysis.confidence == 0.0 {
        confidence.red()
    } else if analysis.confidence < 0.5 {
        confidence.yellow()
    } else {
        confidence.green()
    };

    println!(
        "\n{} {} {}",
        "●".bright_cyan(),
        "Analysis".bright_white().bold(),
        format!("({}, {:.1}s)", analysis.model_used, analysis.duration).bright_black()
    );
    println!("{}", "─".repeat(40).bright_black());
    println!("{}", analysis.summary);

    if !analysis.key_points.is_empty() {
        println!();
        for point in &analysis.key_points {
            println!("  {} {}", "•".yellow(), point);
        }
    }

    if !analysis.sources.is_empty() {
        println!("\n{}", "Sources".green().bold());
        for source in &analysis.sources {
            println!("  {}", source.bright_blue());
        }
    }

    println!("\n{} {}", "Confidence:".green().bold(), confidence);
}
