//! Job orchestrator CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use orchestrator::JobOrchestrator;
use serde_json::json;
use shared::{AnalysisCache, Config, Database, LogConfig, ScrapingJob};
use site_analyzer::WebsiteAnalyzer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// JSON file with a campaign of jobs
    #[arg(short, long)]
    jobs: Option<PathBuf>,

    /// Single-job target URL (alternative to --jobs)
    #[arg(short, long)]
    url: Option<String>,

    /// Engine for the single job
    #[arg(short, long, default_value = "rabbithole")]
    engine: String,

    /// Keywords for the single job (comma-separated)
    #[arg(short, long, default_value = "")]
    keywords: String,

    /// Skip pre-flight analysis even when configured on
    #[arg(long)]
    no_analyze: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if args.no_analyze {
        config.orchestrator.analyze_before_run = false;
    }

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    shared::logging::init(LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "orchestrator".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!("Job orchestrator starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Pre-flight analyzer shares the analysis database
    let analyzer = if config.orchestrator.analyze_before_run {
        let db_path = config.database_path();
        info!(db_path = %db_path.display(), "Opening analysis database");
        let database = Database::open(&db_path).context("Failed to open database")?;
        let cache = AnalysisCache::new(database);
        Some(WebsiteAnalyzer::new(cache, config.analyzer.clone())?)
    } else {
        None
    };

    // Assemble the campaign
    let jobs = match (&args.jobs, &args.url) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read jobs file {}", path.display()))?;
            let jobs: Vec<ScrapingJob> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse jobs file {}", path.display()))?;
            jobs
        }
        (None, Some(url)) => {
            let mut job = ScrapingJob::new(args.engine.clone(), url.clone(), 1);
            job.config
                .insert("keywords".to_string(), json!(args.keywords));
            let seeds: Vec<String> = args
                .keywords
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            job.config.insert("seed_keywords".to_string(), json!(seeds));
            vec![job]
        }
        (None, None) => anyhow::bail!("Either --jobs or --url is required"),
    };

    let orchestrator = JobOrchestrator::new(
        config.orchestrator.clone(),
        config.crawler.clone(),
        analyzer,
    );

    for engine in orchestrator.registry().engines() {
        info!(
            engine = %engine.name,
            active = engine.active,
            "Registered engine"
        );
    }

    let (results, summary) = orchestrator.run_campaign(jobs).await;

    info!("=== Campaign Complete ===");
    info!("Jobs: {}", summary.total_jobs);
    info!("Succeeded: {}", summary.succeeded);
    info!("Failed: {}", summary.failed);
    info!("Items scraped: {}", summary.total_items_scraped);
    info!("Elapsed: {:.1}s", summary.total_seconds);
    for result in &results {
        match &result.error {
            None => info!(
                "  {} {} -> {} items ({:.1}s)",
                result.engine, result.target_url, result.items_scraped, result.execution_seconds
            ),
            Some(error) => info!(
                "  {} {} -> FAILED: {}",
                result.engine, result.target_url, error
            ),
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&results).context("Failed to render results")?
    );

    info!("Job orchestrator finished successfully");

    Ok(())
}
