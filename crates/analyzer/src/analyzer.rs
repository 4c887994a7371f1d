//! Website analyzer: concurrent probes merged into a characteristics record.

use crate::platform::{self, PlatformMatch};
use crate::probes::{self, InitialProbeResult, SecurityProbeResult};
use crate::robots::{self, RobotsInfo};
use crate::sitemap::{self, SitemapSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use shared::config::AnalyzerConfig;
use shared::{
    AnalysisCache, AntiBotMeasure, CacheKeyspace, ContentSizeClass, WebsiteCharacteristics,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Risk and delay weighting constants.
///
/// Hardcoded with no stated derivation; kept in one place so they can be
/// calibrated against real traffic before production use.
pub mod weights {
    /// Per detected anti-bot measure
    pub const ANTI_BOT_MEASURE: f64 = 1.5;
    /// Flat bonus when the site requires JavaScript rendering
    pub const JS_HEAVY: f64 = 1.5;
    /// Initial latency above 5s
    pub const SLOW_RESPONSE: f64 = 1.0;
    /// Initial latency above 2s
    pub const MODERATE_RESPONSE: f64 = 0.5;
    /// Bot-blocking directive in a security header
    pub const BOT_BLOCKING_HEADER: f64 = 1.0;
    /// Any rate-limit hint on the initial response
    pub const RATE_LIMIT_HINT: f64 = 0.5;
    /// No CMS detected (unknown stacks are riskier to crawl)
    pub const NO_CMS: f64 = 0.5;
    pub const MAX_RISK: f64 = 10.0;

    pub const BASE_DELAY_SECONDS: f64 = 1.0;
    /// Extra delay when Cloudflare fronts the site
    pub const CLOUDFLARE_DELAY_BONUS: f64 = 2.0;
    pub const MIN_DELAY_SECONDS: f64 = 1.0;
    pub const MAX_DELAY_SECONDS: f64 = 10.0;
}

/// Weighted risk score over the merged probe results, capped at 10
pub fn compute_risk_score(
    anti_bot_measures: &[AntiBotMeasure],
    javascript_heavy: bool,
    initial_latency_seconds: Option<f64>,
    cms_detected: bool,
    has_rate_limit_hints: bool,
) -> f64 {
    let mut score = anti_bot_measures.len() as f64 * weights::ANTI_BOT_MEASURE;

    if javascript_heavy {
        score += weights::JS_HEAVY;
    }

    if let Some(latency) = initial_latency_seconds {
        if latency > 5.0 {
            score += weights::SLOW_RESPONSE;
        } else if latency > 2.0 {
            score += weights::MODERATE_RESPONSE;
        }
    }

    if anti_bot_measures.contains(&AntiBotMeasure::BotBlockingHeader) {
        score += weights::BOT_BLOCKING_HEADER;
    }

    if has_rate_limit_hints {
        score += weights::RATE_LIMIT_HINT;
    }

    if !cms_detected {
        score += weights::NO_CMS;
    }

    score.min(weights::MAX_RISK)
}

/// Politeness delay derived from risk, floored by the robots crawl-delay.
///
/// The 10s cap applies to the risk-derived part only; a larger robots
/// crawl-delay always wins so the floor invariant holds.
pub fn recommended_delay(
    risk_score: f64,
    robots_crawl_delay: Option<f64>,
    cloudflare: bool,
) -> f64 {
    let mut delay = weights::BASE_DELAY_SECONDS * (1.0 + risk_score / weights::MAX_RISK * 2.0);

    if cloudflare {
        delay += weights::CLOUDFLARE_DELAY_BONUS;
    }

    delay = delay.min(weights::MAX_DELAY_SECONDS);
    delay
        .max(robots_crawl_delay.unwrap_or(0.0))
        .max(weights::MIN_DELAY_SECONDS)
}

/// Pre-flight website analyzer.
///
/// Runs five independent probes concurrently, each bounded by its own
/// timeout, and merges whatever succeeded. A failed probe contributes
/// nothing; it never aborts the others.
pub struct WebsiteAnalyzer {
    client: Client,
    cache: AnalysisCache,
    config: AnalyzerConfig,
}

impl WebsiteAnalyzer {
    pub fn new(cache: AnalysisCache, config: AnalyzerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            cache,
            config,
        })
    }

    /// Access to the cache, shared with other components
    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Analyze a target URL, returning cached characteristics when fresh.
    pub async fn analyze(&self, url: &str, force_refresh: bool) -> Result<WebsiteCharacteristics> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid target URL: {}", url))?;
        let domain = parsed
            .host_str()
            .with_context(|| format!("URL has no host: {}", url))?
            .to_string();

        if !force_refresh {
            if let Some(cached) = self
                .cache
                .get::<WebsiteCharacteristics>(CacheKeyspace::WebsiteAnalysis, &domain)?
            {
                info!(domain = %domain, "Analysis served from cache");
                return Ok(cached);
            }
        }

        info!(url = url, domain = %domain, "Starting website analysis");
        let base_url = base_of(&parsed);
        let probe_timeout = Duration::from_secs(self.config.probe_timeout_seconds);
        let robots_ttl = chrono::Duration::hours(self.config.robots_ttl_hours as i64);
        let sitemap_ttl = chrono::Duration::hours(self.config.sitemap_ttl_hours as i64);

        // Five independent probes; stragglers time out without blocking the merge
        let (initial, platform_match, robots_info, sitemap_summary, security) = tokio::join!(
            timed_probe("initial", probe_timeout, async {
                probes::initial_probe(&self.client, url, self.config.js_marker_threshold).await
            }),
            timed_probe("platform", probe_timeout, async {
                self.platform_probe(url).await
            }),
            timed_probe("robots", probe_timeout, async {
                robots::fetch_robots(&self.client, &base_url, &domain, &self.cache, robots_ttl)
                    .await
            }),
            timed_probe("sitemap", probe_timeout, async {
                Ok(sitemap::discover(&self.client, &base_url, &self.cache, sitemap_ttl).await)
            }),
            timed_probe("security", probe_timeout, async {
                probes::security_probe(&self.client, url).await
            }),
        );

        let platform_match = platform_match.and_then(|(m, _)| m);
        let robots_info = robots_info.and_then(|(r, _)| r);

        // Nothing learned at all: fall back to a maximally conservative
        // record rather than an optimistic-looking empty one
        let sitemap_learned = sitemap_summary
            .as_ref()
            .map(|(s, _)| !s.sitemap_urls.is_empty())
            .unwrap_or(false);
        let all_failed = initial.is_none()
            && platform_match.is_none()
            && robots_info.is_none()
            && !sitemap_learned
            && security.is_none();

        let characteristics = if all_failed {
            warn!(domain = %domain, "All probes failed, using conservative profile");
            WebsiteCharacteristics::conservative(url, &domain)
        } else {
            self.merge(
                url,
                &domain,
                initial,
                platform_match,
                robots_info,
                sitemap_summary,
                security,
            )
        };

        self.cache.put(
            CacheKeyspace::WebsiteAnalysis,
            &domain,
            &characteristics,
            chrono::Duration::hours(self.config.characteristics_ttl_hours as i64),
        )?;

        info!(
            domain = %domain,
            risk_score = characteristics.risk_score,
            delay_seconds = characteristics.recommended_delay_seconds,
            platform = ?characteristics.platform,
            "Website analysis complete"
        );

        Ok(characteristics)
    }

    /// Platform detection probe: one GET inspected for CMS fingerprints
    async fn platform_probe(&self, url: &str) -> Result<Option<PlatformMatch>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Platform probe failed for {}", url))?;

        let mut header_values = Vec::new();
        for name in ["server", "x-powered-by", "x-generator"] {
            if let Some(value) = response.headers().get(name) {
                if let Ok(v) = value.to_str() {
                    header_values.push(v.to_string());
                }
            }
        }
        for name in response.headers().keys() {
            header_values.push(name.as_str().to_string());
        }

        let body = response.text().await.unwrap_or_default();
        Ok(platform::detect(&body, &header_values))
    }

    #[allow(clippy::too_many_arguments)]
    fn merge(
        &self,
        url: &str,
        domain: &str,
        initial: Option<(InitialProbeResult, f64)>,
        platform_match: Option<PlatformMatch>,
        robots_info: Option<RobotsInfo>,
        sitemap_summary: Option<(SitemapSummary, f64)>,
        security: Option<(SecurityProbeResult, f64)>,
    ) -> WebsiteCharacteristics {
        let mut response_times = BTreeMap::new();
        let mut anti_bot_measures = Vec::new();
        let mut rate_limit_hints = Vec::new();
        let mut javascript_heavy = false;
        let mut initial_latency = None;

        if let Some((ref result, elapsed)) = initial {
            response_times.insert("initial".to_string(), elapsed);
            initial_latency = Some(result.latency_seconds);
            javascript_heavy = result.javascript_heavy;
            anti_bot_measures.extend(result.anti_bot_measures.iter().copied());
            rate_limit_hints.extend(result.rate_limit_hints.iter().cloned());
        }

        let mut security_headers = BTreeMap::new();
        if let Some((result, elapsed)) = security {
            response_times.insert("security".to_string(), elapsed);
            if result.bot_blocking && !anti_bot_measures.contains(&AntiBotMeasure::BotBlockingHeader)
            {
                anti_bot_measures.push(AntiBotMeasure::BotBlockingHeader);
            }
            security_headers = result.headers;
        }

        let robots_crawl_delay = robots_info.as_ref().and_then(|r| r.crawl_delay);
        let mut sitemap_urls: Vec<String> = robots_info
            .map(|r| r.sitemaps)
            .unwrap_or_default();

        let mut estimated_page_count = None;
        if let Some((summary, elapsed)) = sitemap_summary {
            response_times.insert("sitemap".to_string(), elapsed);
            for sitemap_url in summary.sitemap_urls {
                if !sitemap_urls.contains(&sitemap_url) {
                    sitemap_urls.push(sitemap_url);
                }
            }
            if summary.estimated_pages > 0 {
                estimated_page_count = Some(summary.estimated_pages);
            }
        }

        let (platform, api_endpoints) = match platform_match {
            Some(m) => (Some(m.platform), m.api_endpoints),
            None => (None, Vec::new()),
        };

        let risk_score = compute_risk_score(
            &anti_bot_measures,
            javascript_heavy,
            initial_latency,
            platform.is_some(),
            !rate_limit_hints.is_empty(),
        );
        let delay = recommended_delay(
            risk_score,
            robots_crawl_delay,
            anti_bot_measures.contains(&AntiBotMeasure::Cloudflare),
        );

        debug!(
            domain = domain,
            measures = anti_bot_measures.len(),
            js_heavy = javascript_heavy,
            pages = ?estimated_page_count,
            "Merged probe results"
        );

        WebsiteCharacteristics {
            url: url.to_string(),
            domain: domain.to_string(),
            platform,
            javascript_heavy,
            anti_bot_measures,
            api_endpoints,
            rate_limit_hints,
            robots_crawl_delay,
            sitemap_urls,
            estimated_page_count,
            security_headers,
            response_times,
            risk_score,
            recommended_delay_seconds: delay,
            content_size_class: ContentSizeClass::from_page_count(estimated_page_count),
            last_analyzed: Utc::now(),
        }
    }
}

/// Scheme + host (+ port) with no trailing slash
fn base_of(url: &Url) -> String {
    let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base.push_str(&format!(":{}", port));
    }
    base
}

/// Run one probe under its own timeout, recording elapsed wall time.
/// Failures and timeouts yield None so the merge sees partial results.
async fn timed_probe<T, F>(name: &str, timeout: Duration, fut: F) -> Option<(T, f64)>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Some((value, start.elapsed().as_secs_f64())),
        Ok(Err(e)) => {
            warn!(probe = name, error = %e, "Probe failed");
            None
        }
        Err(_) => {
            warn!(probe = name, timeout_s = timeout.as_secs(), "Probe timed out");
            None
        }
    }
}
