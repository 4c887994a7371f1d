//! Configuration management for the acquisition engine.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Website analyzer settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Rabbithole crawler settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Job orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Website analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// User-agent sent by all probes
    pub user_agent: String,

    /// Per-probe timeout in seconds
    pub probe_timeout_seconds: u64,

    /// JS framework marker hits needed to flag a site as JS-heavy
    pub js_marker_threshold: usize,

    /// Characteristics cache TTL in hours
    pub characteristics_ttl_hours: u64,

    /// robots.txt cache TTL in hours
    pub robots_ttl_hours: u64,

    /// Sitemap cache TTL in hours
    pub sitemap_ttl_hours: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            user_agent: "KnowledgeAcquisition/0.1".to_string(),
            probe_timeout_seconds: 30,
            js_marker_threshold: 5,
            characteristics_ttl_hours: 24,
            robots_ttl_hours: 168,
            sitemap_ttl_hours: 24,
        }
    }
}

/// Rabbithole crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum recursion depth per session
    pub max_depth: u32,

    /// Session time budget in seconds
    pub time_limit_seconds: u64,

    /// Politeness delay between fetches in milliseconds
    pub politeness_delay_ms: u64,

    /// Per-fetch timeout in seconds
    pub fetch_timeout_seconds: u64,

    /// Retries per fetch on 429/5xx/transport errors
    pub max_fetch_retries: u32,

    /// Base backoff between retries in milliseconds, doubled per attempt
    pub retry_delay_ms: u64,

    /// Pages with less body text than this are rejected
    pub min_content_length: usize,

    /// Nodes scoring below this are rejected
    pub relevance_threshold: f64,

    /// Stored content is truncated to this many characters
    pub max_content_length: usize,

    /// Topics extracted per node
    pub max_topics: usize,

    /// Related links kept per node
    pub max_related_links: usize,

    /// Top-ranked links followed per node
    pub branch_factor: usize,

    /// User-agent sent by crawl fetches
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            time_limit_seconds: 300,
            politeness_delay_ms: 1000,
            fetch_timeout_seconds: 15,
            max_fetch_retries: 2,
            retry_delay_ms: 500,
            min_content_length: 100,
            relevance_threshold: 1.0,
            max_content_length: 20_000,
            max_topics: 25,
            max_related_links: 15,
            branch_factor: 5,
            user_agent: "KnowledgeAcquisition/0.1".to_string(),
        }
    }
}

/// External engine registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEngineConfig {
    pub name: String,
    /// Path to the engine executable
    pub executable: String,
    /// Platforms the engine claims to support
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// Job orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum concurrent jobs in a campaign
    pub max_concurrent_jobs: usize,

    /// Subprocess timeout for external engines in seconds
    pub engine_timeout_seconds: u64,

    /// Directory external engines drop result files into
    pub results_dir: String,

    /// Run analyzer + optimizer before each job
    pub analyze_before_run: bool,

    /// External engines to register at startup
    #[serde(default)]
    pub external_engines: Vec<ExternalEngineConfig>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            engine_timeout_seconds: 600,
            results_dir: "scraping_results".to_string(),
            analyze_before_run: true,
            external_engines: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            database: DatabaseConfig {
                path: "analysis.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            analyzer: AnalyzerConfig::default(),
            crawler: CrawlerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved"
        );

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the database file
    pub fn database_path(&self) -> PathBuf {
        let db_path = Path::new(&self.database.path);
        if db_path.is_absolute() {
            db_path.to_path_buf()
        } else {
            self.data_dir().join(db_path)
        }
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        let log_path = Path::new(&self.logging.log_dir);
        if log_path.is_absolute() {
            log_path.to_path_buf()
        } else {
            self.data_dir().join(log_path)
        }
    }

    /// Get the absolute path for the external engine results directory
    pub fn results_dir(&self) -> PathBuf {
        let results_path = Path::new(&self.orchestrator.results_dir);
        if results_path.is_absolute() {
            results_path.to_path_buf()
        } else {
            self.data_dir().join(results_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.database.path, "analysis.db");
        assert_eq!(config.analyzer.probe_timeout_seconds, 30);
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.orchestrator.max_concurrent_jobs, 3);
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let original = Config::default();
        original.save(&config_path)?;

        assert!(config_path.exists());

        let loaded = Config::from_file(&config_path)?;
        assert_eq!(loaded.data.root_dir, original.data.root_dir);
        assert_eq!(
            loaded.analyzer.characteristics_ttl_hours,
            original.analyzer.characteristics_ttl_hours
        );
        assert_eq!(
            loaded.orchestrator.engine_timeout_seconds,
            original.orchestrator.engine_timeout_seconds
        );

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        let db_path = config.database_path();
        assert!(db_path.ends_with("data/analysis.db"));

        let log_dir = config.log_dir();
        assert!(log_dir.ends_with("data/logs"));

        let results_dir = config.results_dir();
        assert!(results_dir.ends_with("data/scraping_results"));
    }
}
