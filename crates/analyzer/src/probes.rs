//! Initial response and security header probes.
//!
//! Each probe is independent and failure-tolerant: a failed probe
//! contributes nothing to the merged characteristics record.

use anyhow::{Context, Result};
use reqwest::Client;
use shared::AntiBotMeasure;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Script/framework markers counted to flag a JS-heavy site
pub const JS_MARKERS: &[&str] = &[
    "react",
    "vue",
    "angular",
    "next.js",
    "__next_data__",
    "nuxt",
    "svelte",
    "ember",
    "webpack",
    "window.__initial_state__",
    "<noscript>",
];

/// Response headers that indicate server-side rate limiting
const RATE_LIMIT_HEADERS: &[&str] = &[
    "retry-after",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-rate-limit-limit",
    "ratelimit-limit",
];

/// Security headers recorded by the HEAD probe
const SECURITY_HEADER_ALLOWLIST: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
    "x-robots-tag",
];

/// What the initial GET learned about the target
#[derive(Debug, Clone, Default)]
pub struct InitialProbeResult {
    pub latency_seconds: f64,
    pub status: u16,
    pub server: Option<String>,
    pub body_size: usize,
    pub anti_bot_measures: Vec<AntiBotMeasure>,
    pub javascript_heavy: bool,
    pub rate_limit_hints: Vec<String>,
}

/// Classify an initial response. Pure so the heuristics are testable
/// without a live target.
pub fn classify_initial(
    status: u16,
    server: Option<&str>,
    cloudflare_header: bool,
    rate_limit_hints: Vec<String>,
    body: &str,
    latency_seconds: f64,
    js_marker_threshold: usize,
) -> InitialProbeResult {
    let mut measures = Vec::new();

    if status == 403 {
        measures.push(AntiBotMeasure::HttpForbidden);
    }

    let cloudflare_server = server
        .map(|s| s.to_lowercase().contains("cloudflare"))
        .unwrap_or(false);
    if cloudflare_header || cloudflare_server {
        measures.push(AntiBotMeasure::Cloudflare);
    }

    if !rate_limit_hints.is_empty() {
        measures.push(AntiBotMeasure::RateLimitHeaders);
    }

    let body_lower = body.to_lowercase();
    let marker_hits: usize = JS_MARKERS
        .iter()
        .map(|m| body_lower.matches(m).count())
        .sum();
    let javascript_heavy = marker_hits >= js_marker_threshold;

    InitialProbeResult {
        latency_seconds,
        status,
        server: server.map(|s| s.to_string()),
        body_size: body.len(),
        anti_bot_measures: measures,
        javascript_heavy,
        rate_limit_hints,
    }
}

/// One GET against the target URL: latency, server banner, anti-bot
/// signals, JS-heaviness, rate-limit hints.
pub async fn initial_probe(
    client: &Client,
    url: &str,
    js_marker_threshold: usize,
) -> Result<InitialProbeResult> {
    let start = Instant::now();
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Initial probe failed for {}", url))?;
    let latency = start.elapsed().as_secs_f64();

    let status = response.status().as_u16();
    let server = response
        .headers()
        .get("server")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let cloudflare_header = response.headers().contains_key("cf-ray")
        || response.headers().contains_key("cf-cache-status");

    let mut rate_limit_hints = Vec::new();
    for name in RATE_LIMIT_HEADERS {
        if let Some(value) = response.headers().get(*name) {
            let rendered = value.to_str().unwrap_or("");
            rate_limit_hints.push(format!("{}: {}", name, rendered));
        }
    }

    // A 403 body is still useful for fingerprinting, so read it regardless
    let body = response.text().await.unwrap_or_default();

    debug!(
        url = url,
        status = status,
        latency_ms = (latency * 1000.0) as u64,
        body_bytes = body.len(),
        "Initial probe complete"
    );

    Ok(classify_initial(
        status,
        server.as_deref(),
        cloudflare_header,
        rate_limit_hints,
        &body,
        latency,
        js_marker_threshold,
    ))
}

/// What the HEAD probe learned about security posture
#[derive(Debug, Clone, Default)]
pub struct SecurityProbeResult {
    pub headers: BTreeMap<String, String>,
    /// X-Robots-Tag carries a bot-blocking directive
    pub bot_blocking: bool,
}

/// Classify captured security headers. Pure for testability.
pub fn classify_security(headers: BTreeMap<String, String>) -> SecurityProbeResult {
    let bot_blocking = headers
        .get("x-robots-tag")
        .map(|v| {
            let v = v.to_lowercase();
            v.contains("noindex") || v.contains("nofollow") || v.contains("none")
        })
        .unwrap_or(false);

    SecurityProbeResult {
        headers,
        bot_blocking,
    }
}

/// One HEAD request recording the allow-listed security headers.
pub async fn security_probe(client: &Client, url: &str) -> Result<SecurityProbeResult> {
    let response = client
        .head(url)
        .send()
        .await
        .with_context(|| format!("Security probe failed for {}", url))?;

    let mut headers = BTreeMap::new();
    for name in SECURITY_HEADER_ALLOWLIST {
        if let Some(value) = response.headers().get(*name) {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
    }

    debug!(url = url, captured = headers.len(), "Security probe complete");

    Ok(classify_security(headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_403_and_cloudflare() {
        let result = classify_initial(403, Some("cloudflare"), true, vec![], "", 0.1, 5);
        assert!(result
            .anti_bot_measures
            .contains(&AntiBotMeasure::HttpForbidden));
        assert!(result
            .anti_bot_measures
            .contains(&AntiBotMeasure::Cloudflare));
    }

    #[test]
    fn test_classify_cloudflare_header_only() {
        let result = classify_initial(200, Some("nginx"), true, vec![], "", 0.1, 5);
        assert!(result
            .anti_bot_measures
            .contains(&AntiBotMeasure::Cloudflare));
        assert!(!result
            .anti_bot_measures
            .contains(&AntiBotMeasure::HttpForbidden));
    }

    #[test]
    fn test_js_heavy_threshold() {
        let body = "react react react react react";
        let heavy = classify_initial(200, None, false, vec![], body, 0.1, 5);
        assert!(heavy.javascript_heavy);

        let light = classify_initial(200, None, false, vec![], "react once", 0.1, 5);
        assert!(!light.javascript_heavy);
    }

    #[test]
    fn test_rate_limit_hints_flagged() {
        let hints = vec!["retry-after: 30".to_string()];
        let result = classify_initial(200, None, false, hints, "", 0.1, 5);
        assert!(result
            .anti_bot_measures
            .contains(&AntiBotMeasure::RateLimitHeaders));
        assert_eq!(result.rate_limit_hints.len(), 1);
    }

    #[test]
    fn test_classify_security_bot_blocking() {
        let mut headers = BTreeMap::new();
        headers.insert("x-robots-tag".to_string(), "noindex, nofollow".to_string());
        let result = classify_security(headers);
        assert!(result.bot_blocking);

        let benign = classify_security(BTreeMap::from([(
            "x-robots-tag".to_string(),
            "all".to_string(),
        )]));
        assert!(!benign.bot_blocking);
    }
}
