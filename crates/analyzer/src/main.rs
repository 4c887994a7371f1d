//! Website analyzer CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use shared::{AnalysisCache, Config, Database, LogConfig};
use site_analyzer::{CrawlGoals, StrategyOptimizer, WebsiteAnalyzer};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Target URL to analyze
    #[arg(short, long)]
    url: String,

    /// Re-analyze even when a fresh cached record exists
    #[arg(long)]
    force_refresh: bool,

    /// Keywords guiding the strategy (comma-separated)
    #[arg(short, long, default_value = "")]
    keywords: String,

    /// Page budget for the optimized strategy
    #[arg(long, default_value_t = 50)]
    max_pages: u32,

    /// Delete expired cache rows before analyzing
    #[arg(long)]
    purge_cache: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    shared::logging::init(LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "site-analyzer".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!("Website analyzer starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize database and cache
    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;
    let cache = AnalysisCache::new(database);

    if args.purge_cache {
        let purged = cache.purge_expired().context("Failed to purge cache")?;
        info!(purged = purged, "Purged expired cache rows");
    }

    let stats = cache.stats().context("Failed to get cache stats")?;
    info!(
        analysis_rows = stats.analysis_rows,
        robots_rows = stats.robots_rows,
        sitemap_rows = stats.sitemap_rows,
        "Cache statistics"
    );

    // Run the analysis
    let analyzer = WebsiteAnalyzer::new(cache, config.analyzer.clone())
        .context("Failed to create analyzer")?;
    let characteristics = analyzer
        .analyze(&args.url, args.force_refresh)
        .await
        .context("Analysis failed")?;

    info!("=== Analysis Complete ===");
    info!("Domain: {}", characteristics.domain);
    info!("Platform: {:?}", characteristics.platform);
    info!("JavaScript heavy: {}", characteristics.javascript_heavy);
    info!("Anti-bot measures: {}", characteristics.anti_bot_measures.len());
    info!("API endpoints: {}", characteristics.api_endpoints.len());
    info!("Sitemaps: {}", characteristics.sitemap_urls.len());
    info!("Estimated pages: {:?}", characteristics.estimated_page_count);
    info!("Content size class: {:?}", characteristics.content_size_class);
    info!("Risk score: {:.1}/10", characteristics.risk_score);
    info!(
        "Recommended delay: {:.1}s",
        characteristics.recommended_delay_seconds
    );

    // Derive a strategy from the characteristics
    let goals = CrawlGoals {
        keywords: args
            .keywords
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect(),
        max_pages: args.max_pages,
        high_throughput: false,
    };
    let strategy = StrategyOptimizer::new().optimize(&characteristics, &goals);

    info!("=== Recommended Strategy ===");
    info!("Engine: {}", strategy.engine);
    info!("Delay: {:.1}s", strategy.config.delay_seconds);
    info!("Page budget: {}", strategy.config.page_budget);
    info!(
        "Estimated duration: {:.0}s",
        strategy.estimated_duration_seconds
    );
    info!(
        "Success probability: {:.0}%",
        strategy.risk_assessment.success_probability * 100.0
    );
    for fallback in &strategy.fallbacks {
        info!(
            "Fallback: {} ({})",
            fallback.engine, fallback.reason
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&strategy).context("Failed to render strategy")?
    );

    info!("Website analyzer finished successfully");

    Ok(())
}
