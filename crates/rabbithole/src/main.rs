//! Rabbithole crawler CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use rabbithole::RabbitholeCrawler;
use shared::collaborators::parse_term_list;
use shared::{Config, LogConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Seed URL to start the crawl from
    #[arg(short, long)]
    url: String,

    /// Seed keywords (comma-separated); weighted above expanded terms
    #[arg(short, long)]
    keywords: String,

    /// Override the configured maximum depth
    #[arg(long)]
    max_depth: Option<u32>,

    /// Write accepted nodes to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,

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
        component: "rabbithole".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    info!("Rabbithole crawler starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let mut crawler_config = config.crawler.clone();
    if let Some(max_depth) = args.max_depth {
        crawler_config.max_depth = max_depth;
    }

    // Seed terms carry double weight against expanded terms
    let seeds: Vec<String> = args
        .keywords
        .split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let keywords = parse_term_list(&args.keywords, &seeds);
    if keywords.is_empty() {
        anyhow::bail!("At least one keyword is required");
    }

    let crawler = RabbitholeCrawler::new(crawler_config).context("Failed to create crawler")?;
    let summary = crawler.crawl(&args.url, keywords).await.context("Crawl failed")?;

    info!("=== Crawl Complete ===");
    info!("Pages visited: {}", summary.pages_visited);
    info!("Pages rejected: {}", summary.pages_rejected);
    info!("Knowledge nodes: {}", summary.nodes.len());
    info!("High-relevance nodes: {}", summary.high_relevance_nodes);
    info!("Average relevance: {:.2}", summary.average_relevance);
    info!("Max relevance: {:.2}", summary.max_relevance);
    info!("Distinct topics: {}", summary.distinct_topics);
    for (depth, count) in &summary.nodes_per_depth {
        info!("Depth {}: {} nodes", depth, count);
    }
    info!("Elapsed: {:.1}s", summary.elapsed_seconds);

    if let Some(output) = args.output {
        let rendered = serde_json::to_string_pretty(&summary.nodes)
            .context("Failed to serialize nodes")?;
        std::fs::write(&output, rendered)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!(path = %output.display(), "Nodes written");
    }

    info!("Rabbithole crawler finished successfully");

    Ok(())
}
