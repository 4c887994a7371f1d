//! Strategy optimizer: scores candidate engines against site
//! characteristics and emits an executable scraping strategy.

use crate::platform;
use shared::{
    AntiBotMeasure, AntiDetectionPolicy, ContentSizeClass, EngineConfig, EngineExtensions,
    FallbackStrategy, Platform, RateLimitPolicy, RiskAssessment, RiskFactor, ScrapingStrategy,
    WebsiteCharacteristics,
};
use tracing::{debug, info};
use url::Url;

/// Capability tier on one scoring dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Low,
    Medium,
    High,
}

/// Static capability descriptor for one engine
#[derive(Debug, Clone)]
pub struct EngineCapability {
    pub name: &'static str,
    pub supports_js: bool,
    pub concurrency: Tier,
    pub anti_detection: Tier,
    pub api_support: Tier,
    /// Platforms this engine pairs well with
    pub preferred_platforms: &'static [Platform],
}

/// The statically known engine catalog. Declaration order breaks scoring
/// ties, so selection is deterministic.
pub const ENGINE_MATRIX: &[EngineCapability] = &[
    EngineCapability {
        name: "rabbithole",
        supports_js: false,
        concurrency: Tier::Low,
        anti_detection: Tier::Medium,
        api_support: Tier::Low,
        preferred_platforms: &[Platform::WordPress, Platform::Ghost],
    },
    EngineCapability {
        name: "headless-browser",
        supports_js: true,
        concurrency: Tier::Low,
        anti_detection: Tier::High,
        api_support: Tier::Low,
        preferred_platforms: &[Platform::Wix, Platform::Squarespace],
    },
    EngineCapability {
        name: "fleet",
        supports_js: false,
        concurrency: Tier::High,
        anti_detection: Tier::Low,
        api_support: Tier::Medium,
        preferred_platforms: &[],
    },
    EngineCapability {
        name: "api-harvester",
        supports_js: false,
        concurrency: Tier::Medium,
        anti_detection: Tier::Low,
        api_support: Tier::High,
        preferred_platforms: &[Platform::Shopify, Platform::Drupal],
    },
];

/// Scoring weights for engine selection
mod weights {
    pub const JS_REQUIRED_SUPPORTED: f64 = 30.0;
    pub const JS_REQUIRED_UNSUPPORTED: f64 = -20.0;
    /// High-concurrency engine against a large site
    pub const HIGH_CONCURRENCY: f64 = 5.0;
    /// High-concurrency engine when the caller wants throughput
    pub const HIGH_CONCURRENCY_THROUGHPUT: f64 = 10.0;
    pub const ANTI_DETECTION_UNDER_RISK: f64 = 15.0;
    pub const API_SUPPORT_HIGH: f64 = 12.0;
    pub const API_SUPPORT_MEDIUM: f64 = 6.0;
    pub const PLATFORM_PAIRING: f64 = 5.0;

    /// Risk above which burst protection is enabled
    pub const BURST_PROTECTION_RISK: f64 = 6.0;
    /// Risk above which anti-detection escalates
    pub const ESCALATION_RISK: f64 = 7.0;
    pub const MAX_BACKOFF_DELAY_SECONDS: f64 = 60.0;

    /// Error-overhead multiplier on the duration estimate
    pub const ERROR_OVERHEAD: f64 = 1.2;
    pub const SETUP_COST_SECONDS: f64 = 30.0;
}

/// Caller-supplied goals for a crawl
#[derive(Debug, Clone)]
pub struct CrawlGoals {
    pub keywords: Vec<String>,
    /// Page budget for the job
    pub max_pages: u32,
    /// Favor high-concurrency engines
    pub high_throughput: bool,
}

impl Default for CrawlGoals {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            max_pages: 50,
            high_throughput: false,
        }
    }
}

/// Derives a scraping strategy from analyzed characteristics
pub struct StrategyOptimizer;

impl StrategyOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Produce the full strategy for one target
    pub fn optimize(
        &self,
        characteristics: &WebsiteCharacteristics,
        goals: &CrawlGoals,
    ) -> ScrapingStrategy {
        let engine = self.select_engine(characteristics, goals);
        let config = self.build_config(engine, characteristics, goals);
        let fallbacks = self.build_fallbacks(engine, &config, characteristics, goals);

        let strategy = ScrapingStrategy {
            target_url: characteristics.url.clone(),
            engine: engine.name.to_string(),
            rate_limit: self.rate_limit_policy(characteristics),
            anti_detection: self.anti_detection_policy(engine, characteristics),
            priority_urls: self.priority_urls(characteristics),
            estimated_duration_seconds: self.estimate_duration(&config, characteristics),
            risk_assessment: self.assess_risk(characteristics),
            config,
            fallbacks,
        };

        info!(
            url = %strategy.target_url,
            engine = %strategy.engine,
            success_probability = strategy.risk_assessment.success_probability,
            fallbacks = strategy.fallbacks.len(),
            "Strategy optimized"
        );

        strategy
    }

    /// Highest score wins; ties break by declaration order
    fn select_engine(
        &self,
        characteristics: &WebsiteCharacteristics,
        goals: &CrawlGoals,
    ) -> &'static EngineCapability {
        let mut best = &ENGINE_MATRIX[0];
        let mut best_score = f64::NEG_INFINITY;

        for candidate in ENGINE_MATRIX {
            let score = self.score_engine(candidate, characteristics, goals);
            debug!(engine = candidate.name, score = score, "Engine scored");
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }

        best
    }

    fn score_engine(
        &self,
        engine: &EngineCapability,
        characteristics: &WebsiteCharacteristics,
        goals: &CrawlGoals,
    ) -> f64 {
        let mut score = 0.0;

        if characteristics.javascript_heavy {
            score += if engine.supports_js {
                weights::JS_REQUIRED_SUPPORTED
            } else {
                weights::JS_REQUIRED_UNSUPPORTED
            };
        }

        if engine.concurrency == Tier::High {
            if characteristics.content_size_class == ContentSizeClass::Large {
                score += weights::HIGH_CONCURRENCY;
            }
            if goals.high_throughput {
                score += weights::HIGH_CONCURRENCY_THROUGHPUT;
            }
        }

        if characteristics.risk_score >= weights::BURST_PROTECTION_RISK
            && engine.anti_detection == Tier::High
        {
            score += weights::ANTI_DETECTION_UNDER_RISK;
        }

        if !characteristics.api_endpoints.is_empty() {
            score += match engine.api_support {
                Tier::High => weights::API_SUPPORT_HIGH,
                Tier::Medium => weights::API_SUPPORT_MEDIUM,
                Tier::Low => 0.0,
            };
        }

        if let Some(platform) = characteristics.platform {
            if engine.preferred_platforms.contains(&platform) {
                score += weights::PLATFORM_PAIRING;
            }
        }

        score
    }

    fn build_config(
        &self,
        engine: &EngineCapability,
        characteristics: &WebsiteCharacteristics,
        goals: &CrawlGoals,
    ) -> EngineConfig {
        let delay = characteristics.recommended_delay_seconds;

        let extensions = if engine.supports_js {
            EngineExtensions::Browser {
                headless: true,
                stealth: characteristics.risk_score >= weights::ESCALATION_RISK,
            }
        } else if engine.concurrency == Tier::High {
            // Worker pool sized inversely to the politeness delay
            let workers = (10.0 / delay.max(0.5)).ceil() as u32;
            EngineExtensions::WorkerPool {
                workers: workers.clamp(1, 8),
            }
        } else {
            EngineExtensions::None
        };

        EngineConfig {
            delay_seconds: delay,
            timeout_seconds: 30,
            max_retries: 3,
            page_budget: goals.max_pages,
            respect_robots: true,
            extensions,
            extra: Default::default(),
        }
    }

    fn rate_limit_policy(&self, characteristics: &WebsiteCharacteristics) -> RateLimitPolicy {
        RateLimitPolicy {
            base_delay_seconds: characteristics.recommended_delay_seconds,
            adaptive: true,
            exponential_backoff: true,
            max_delay_seconds: weights::MAX_BACKOFF_DELAY_SECONDS,
            burst_protection: characteristics.risk_score >= weights::BURST_PROTECTION_RISK,
            robots_floor_seconds: characteristics.robots_crawl_delay,
        }
    }

    fn anti_detection_policy(
        &self,
        engine: &EngineCapability,
        characteristics: &WebsiteCharacteristics,
    ) -> AntiDetectionPolicy {
        let escalated = characteristics.risk_score >= weights::ESCALATION_RISK;

        AntiDetectionPolicy {
            rotate_user_agents: true,
            randomize_headers: true,
            rotate_proxies: escalated,
            randomize_timing: escalated,
            mimic_behavior: escalated,
            stealth_mode: engine.supports_js,
        }
    }

    /// Primary URL first, then up to 3 API endpoints, up to 2 sitemaps,
    /// then goal-specific well-known paths for the detected platform
    fn priority_urls(&self, characteristics: &WebsiteCharacteristics) -> Vec<String> {
        let mut urls = vec![characteristics.url.clone()];

        let base = Url::parse(&characteristics.url)
            .ok()
            .map(|u| {
                let mut base = format!("{}://{}", u.scheme(), u.host_str().unwrap_or_default());
                if let Some(port) = u.port() {
                    base.push_str(&format!(":{}", port));
                }
                base
            })
            .unwrap_or_default();

        for endpoint in characteristics.api_endpoints.iter().take(3) {
            urls.push(format!("{}{}", base, endpoint));
        }

        for sitemap in characteristics.sitemap_urls.iter().take(2) {
            urls.push(sitemap.clone());
        }

        if let Some(platform) = characteristics.platform {
            for path in platform::well_known_paths(platform) {
                urls.push(format!("{}{}", base, path));
            }
        }

        // First occurrence wins, wherever the duplicate shows up
        let mut seen = std::collections::HashSet::new();
        urls.retain(|u| seen.insert(u.clone()));
        urls
    }

    fn estimate_duration(
        &self,
        config: &EngineConfig,
        characteristics: &WebsiteCharacteristics,
    ) -> f64 {
        let latency = characteristics
            .response_times
            .get("initial")
            .copied()
            .unwrap_or(1.0);

        config.page_budget as f64 * (config.delay_seconds + latency) * weights::ERROR_OVERHEAD
            + weights::SETUP_COST_SECONDS
    }

    fn assess_risk(&self, characteristics: &WebsiteCharacteristics) -> RiskAssessment {
        let mut factors = Vec::new();

        if characteristics.has_measure(AntiBotMeasure::Cloudflare) {
            factors.push(RiskFactor {
                name: "cloudflare_fronting".to_string(),
                mitigation: "stealth mode with longer politeness delays".to_string(),
            });
        }
        if characteristics.javascript_heavy {
            factors.push(RiskFactor {
                name: "javascript_dependency".to_string(),
                mitigation: "use a JS-rendering engine or API endpoints".to_string(),
            });
        }
        if characteristics.has_measure(AntiBotMeasure::RateLimitHeaders) {
            factors.push(RiskFactor {
                name: "aggressive_rate_limiting".to_string(),
                mitigation: "adaptive delays with exponential backoff".to_string(),
            });
        }
        let slow = characteristics
            .response_times
            .get("initial")
            .map(|l| *l > 5.0)
            .unwrap_or(false);
        if slow {
            factors.push(RiskFactor {
                name: "slow_responses".to_string(),
                mitigation: "raise timeouts and reduce page budget".to_string(),
            });
        }

        RiskAssessment {
            success_probability: (1.0 - characteristics.risk_score / 10.0).max(0.1),
            factors,
        }
    }

    /// Ordered fallback chain. No fallback may repeat the primary engine
    /// with an identical configuration.
    fn build_fallbacks(
        &self,
        primary: &EngineCapability,
        primary_config: &EngineConfig,
        characteristics: &WebsiteCharacteristics,
        goals: &CrawlGoals,
    ) -> Vec<FallbackStrategy> {
        let mut fallbacks = Vec::new();

        // JS-capable fallback when the primary can't render a JS-heavy site
        if characteristics.javascript_heavy && !primary.supports_js {
            let mut config = primary_config.clone();
            config.extensions = EngineExtensions::Browser {
                headless: true,
                stealth: true,
            };
            fallbacks.push(FallbackStrategy {
                engine: "headless-browser".to_string(),
                config,
                reason: "site requires JavaScript rendering".to_string(),
            });
        }

        // Conservative variant of the same engine
        let mut conservative = primary_config.clone();
        conservative.delay_seconds *= 2.0;
        conservative.page_budget = (conservative.page_budget / 2).max(1);
        conservative.max_retries += 2;
        fallbacks.push(FallbackStrategy {
            engine: primary.name.to_string(),
            config: conservative,
            reason: "conservative retry with doubled delay".to_string(),
        });

        // API-only fallback when endpoints were discovered
        if !characteristics.api_endpoints.is_empty() {
            let mut config = primary_config.clone();
            config.extensions = EngineExtensions::None;
            config.page_budget = goals.max_pages.min(characteristics.api_endpoints.len() as u32 * 10);
            fallbacks.push(FallbackStrategy {
                engine: "api-harvester".to_string(),
                config,
                reason: "restrict to discovered API endpoints".to_string(),
            });
        }

        fallbacks.retain(|f| !(f.engine == primary.name && f.config == *primary_config));
        fallbacks
    }
}

impl Default for StrategyOptimizer {
    fn default() -> Self {
        Self::new()
    }
}
