//! Data models for the acquisition pipeline.
//!
//! This module defines all the data structures passed between the analyzer,
//! the strategy optimizer, the rabbithole crawler, and the job orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Detected CMS / site platform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WordPress,
    Shopify,
    Drupal,
    Ghost,
    Wix,
    Squarespace,
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::WordPress => "wordpress",
            Platform::Shopify => "shopify",
            Platform::Drupal => "drupal",
            Platform::Ghost => "ghost",
            Platform::Wix => "wix",
            Platform::Squarespace => "squarespace",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wordpress" => Ok(Platform::WordPress),
            "shopify" => Ok(Platform::Shopify),
            "drupal" => Ok(Platform::Drupal),
            "ghost" => Ok(Platform::Ghost),
            "wix" => Ok(Platform::Wix),
            "squarespace" => Ok(Platform::Squarespace),
            _ => Err(anyhow::anyhow!("Unknown platform: {}", s)),
        }
    }
}

/// Anti-bot measure detected during analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AntiBotMeasure {
    /// Cloudflare fronting (cf-ray header or server banner)
    Cloudflare,
    /// 403 on the initial probe
    HttpForbidden,
    /// Rate-limit headers on the initial response
    RateLimitHeaders,
    /// Bot-blocking directives in X-Robots-Tag
    BotBlockingHeader,
}

impl std::fmt::Display for AntiBotMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AntiBotMeasure::Cloudflare => "cloudflare",
            AntiBotMeasure::HttpForbidden => "http_forbidden",
            AntiBotMeasure::RateLimitHeaders => "rate_limit_headers",
            AntiBotMeasure::BotBlockingHeader => "bot_blocking_header",
        };
        write!(f, "{}", s)
    }
}

/// Coarse bucket for a site's estimated page count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentSizeClass {
    Small,
    Medium,
    Large,
    Unknown,
}

impl ContentSizeClass {
    /// Classify from an estimated page count. Buckets: < 100 small,
    /// < 10_000 medium, otherwise large.
    pub fn from_page_count(count: Option<u64>) -> Self {
        match count {
            None => ContentSizeClass::Unknown,
            Some(n) if n < 100 => ContentSizeClass::Small,
            Some(n) if n < 10_000 => ContentSizeClass::Medium,
            Some(_) => ContentSizeClass::Large,
        }
    }
}

/// Everything the analyzer learned about one domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteCharacteristics {
    pub url: String,
    pub domain: String,

    /// Detected CMS/platform, if any
    pub platform: Option<Platform>,
    /// Site appears to require JavaScript rendering
    pub javascript_heavy: bool,
    pub anti_bot_measures: Vec<AntiBotMeasure>,

    /// Well-known API endpoint paths for the detected platform
    pub api_endpoints: Vec<String>,
    /// Raw rate-limit hints (header names, retry-after values)
    pub rate_limit_hints: Vec<String>,
    /// Crawl-delay declared in robots.txt, if any
    pub robots_crawl_delay: Option<f64>,
    pub sitemap_urls: Vec<String>,
    /// Estimated page count from sitemap discovery
    pub estimated_page_count: Option<u64>,

    /// Security headers captured by the HEAD probe (allow-listed)
    pub security_headers: BTreeMap<String, String>,
    /// Per-phase response times in seconds (initial, robots, sitemap, security)
    pub response_times: BTreeMap<String, f64>,

    /// Composite block/throttle risk, 0..=10
    pub risk_score: f64,
    /// Politeness delay the optimizer should start from; >= 1.0 and
    /// >= robots crawl-delay
    pub recommended_delay_seconds: f64,
    pub content_size_class: ContentSizeClass,

    pub last_analyzed: DateTime<Utc>,
}

impl WebsiteCharacteristics {
    /// A maximally conservative record for a domain nothing could be
    /// learned about. Ordinary return value, never an error.
    pub fn conservative(url: &str, domain: &str) -> Self {
        Self {
            url: url.to_string(),
            domain: domain.to_string(),
            platform: None,
            javascript_heavy: false,
            anti_bot_measures: Vec::new(),
            api_endpoints: Vec::new(),
            rate_limit_hints: Vec::new(),
            robots_crawl_delay: None,
            sitemap_urls: Vec::new(),
            estimated_page_count: None,
            security_headers: BTreeMap::new(),
            response_times: BTreeMap::new(),
            risk_score: 10.0,
            recommended_delay_seconds: 10.0,
            content_size_class: ContentSizeClass::Unknown,
            last_analyzed: Utc::now(),
        }
    }

    pub fn has_measure(&self, measure: AntiBotMeasure) -> bool {
        self.anti_bot_measures.contains(&measure)
    }
}

/// Engine-specific configuration extensions, one variant per engine family
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineExtensions {
    None,
    /// Browser-style engines that render JavaScript
    Browser { headless: bool, stealth: bool },
    /// High-concurrency engines with a worker pool
    WorkerPool { workers: u32 },
}

/// Configuration handed to an engine for one job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Delay between requests in seconds
    pub delay_seconds: f64,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// Maximum pages the engine may fetch
    pub page_budget: u32,
    pub respect_robots: bool,
    pub extensions: EngineExtensions,
    /// Opaque pass-through for truly engine-specific keys
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Rate-limiting policy derived from site characteristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub base_delay_seconds: f64,
    pub adaptive: bool,
    pub exponential_backoff: bool,
    pub max_delay_seconds: f64,
    pub burst_protection: bool,
    /// Floor from robots.txt crawl-delay, when declared
    pub robots_floor_seconds: Option<f64>,
}

/// Anti-detection measures the engine should apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiDetectionPolicy {
    pub rotate_user_agents: bool,
    pub randomize_headers: bool,
    pub rotate_proxies: bool,
    pub randomize_timing: bool,
    pub mimic_behavior: bool,
    /// Engine-level stealth toggles, set when the chosen engine renders JS
    pub stealth_mode: bool,
}

/// One concrete risk factor with its mitigation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub mitigation: String,
}

/// Risk assessment embedded in a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub factors: Vec<RiskFactor>,
    /// max(0.1, 1 - risk_score / 10)
    pub success_probability: f64,
}

/// An ordered fallback to try when the primary engine fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackStrategy {
    pub engine: String,
    pub config: EngineConfig,
    pub reason: String,
}

/// Executable plan produced by the strategy optimizer.
///
/// Immutable once produced; consumed once by a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingStrategy {
    pub target_url: String,
    pub engine: String,
    pub config: EngineConfig,
    pub rate_limit: RateLimitPolicy,
    pub anti_detection: AntiDetectionPolicy,
    /// Primary URL first, then API endpoints, sitemaps, well-known paths
    pub priority_urls: Vec<String>,
    pub estimated_duration_seconds: f64,
    pub risk_assessment: RiskAssessment,
    pub fallbacks: Vec<FallbackStrategy>,
}

/// A keyword with a relevance weight (seeds 2.0, expanded terms 1.0)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedKeyword {
    pub term: String,
    pub weight: f64,
}

impl WeightedKeyword {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// One successfully scraped page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub url: String,
    pub title: String,
    /// Body text, capped at the configured maximum
    pub content: String,
    pub topics: Vec<String>,
    /// Same-domain outbound links worth following
    pub related_links: Vec<String>,
    pub depth: u32,
    /// Relevance against the session keywords, 0..=10
    pub relevance_score: f64,
    pub scraped_at: DateTime<Utc>,
}

/// One unit of work for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingJob {
    /// Target engine name from the registry
    pub engine: String,
    /// Platform/sub-type hint passed to external engines
    pub platform: Option<String>,
    pub target_url: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    /// 1 = highest
    pub priority: u32,
    pub created_at: DateTime<Utc>,
}

impl ScrapingJob {
    pub fn new(engine: impl Into<String>, target_url: impl Into<String>, priority: u32) -> Self {
        Self {
            engine: engine.into(),
            platform: None,
            target_url: target_url.into(),
            config: HashMap::new(),
            priority,
            created_at: Utc::now(),
        }
    }
}

/// Outcome status of a single job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Content-quality summary from the post-processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Fraction of items with non-empty content, 0..=1
    pub quality_score: f64,
    pub average_content_length: f64,
    pub items_before_dedup: usize,
}

/// Result of one executed job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub engine: String,
    pub target_url: String,
    pub status: JobStatus,
    pub items_scraped: usize,
    pub execution_seconds: f64,
    pub analysis: Option<WebsiteCharacteristics>,
    pub strategy: Option<ScrapingStrategy>,
    pub quality: Option<QualitySummary>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn failed(job: &ScrapingJob, seconds: f64, error: impl Into<String>) -> Self {
        Self {
            engine: job.engine.clone(),
            target_url: job.target_url.clone(),
            status: JobStatus::Failed,
            items_scraped: 0,
            execution_seconds: seconds,
            analysis: None,
            strategy: None,
            quality: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Aggregate over all jobs in a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of item counts of successful jobs only
    pub total_items_scraped: usize,
    pub total_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_class_buckets() {
        assert_eq!(
            ContentSizeClass::from_page_count(None),
            ContentSizeClass::Unknown
        );
        assert_eq!(
            ContentSizeClass::from_page_count(Some(50)),
            ContentSizeClass::Small
        );
        assert_eq!(
            ContentSizeClass::from_page_count(Some(100)),
            ContentSizeClass::Medium
        );
        assert_eq!(
            ContentSizeClass::from_page_count(Some(10_000)),
            ContentSizeClass::Large
        );
    }

    #[test]
    fn test_platform_round_trip() {
        let p: Platform = "wordpress".parse().unwrap();
        assert_eq!(p, Platform::WordPress);
        assert_eq!(p.to_string(), "wordpress");
        assert!("geocities".parse::<Platform>().is_err());
    }

    #[test]
    fn test_conservative_characteristics() {
        let chars = WebsiteCharacteristics::conservative("https://example.com", "example.com");
        assert_eq!(chars.risk_score, 10.0);
        assert!(chars.recommended_delay_seconds >= 1.0);
        assert_eq!(chars.content_size_class, ContentSizeClass::Unknown);
    }

    #[test]
    fn test_failed_job_result() {
        let job = ScrapingJob::new("rabbithole", "https://example.com", 1);
        let result = JobResult::failed(&job, 0.5, "engine unavailable");
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.items_scraped, 0);
        assert_eq!(result.error.as_deref(), Some("engine unavailable"));
    }
}
