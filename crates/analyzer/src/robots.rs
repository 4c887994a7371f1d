//! robots.txt fetching and parsing.
//!
//! Extracts the crawl-delay directive and any Sitemap: lines. The raw text
//! is cached in the robots keyspace so repeat analyses skip the fetch.

use anyhow::Result;
use reqwest::Client;
use shared::{AnalysisCache, CacheKeyspace};
use tracing::{debug, warn};

/// Parsed robots.txt directives relevant to crawl planning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsInfo {
    /// Largest crawl-delay seen in the file, in seconds
    pub crawl_delay: Option<f64>,
    /// Sitemap: URLs declared in the file
    pub sitemaps: Vec<String>,
}

/// Parse robots.txt text. Tolerates malformed lines by skipping them.
pub fn parse_robots(text: &str) -> RobotsInfo {
    let mut info = RobotsInfo::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (directive, value) = match line.split_once(':') {
            Some((d, v)) => (d.trim().to_lowercase(), v.trim()),
            None => continue,
        };

        match directive.as_str() {
            "crawl-delay" => {
                if let Ok(delay) = value.parse::<f64>() {
                    if delay > 0.0 {
                        info.crawl_delay = Some(match info.crawl_delay {
                            Some(existing) => existing.max(delay),
                            None => delay,
                        });
                    }
                }
            }
            "sitemap" => {
                if !value.is_empty() && !info.sitemaps.contains(&value.to_string()) {
                    info.sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    info
}

/// Fetch robots.txt for a domain, using the robots cache keyspace.
///
/// Returns None when the file is missing or unreachable; that is not an
/// error, it just contributes nothing to the analysis.
pub async fn fetch_robots(
    client: &Client,
    base_url: &str,
    domain: &str,
    cache: &AnalysisCache,
    ttl: chrono::Duration,
) -> Result<Option<RobotsInfo>> {
    if let Some(text) = cache.get::<String>(CacheKeyspace::Robots, domain)? {
        debug!(domain = domain, "robots.txt served from cache");
        return Ok(Some(parse_robots(&text)));
    }

    let robots_url = format!("{}/robots.txt", base_url.trim_end_matches('/'));
    let response = match client.get(&robots_url).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url = %robots_url, error = %e, "robots.txt fetch failed");
            return Ok(None);
        }
    };

    if !response.status().is_success() {
        debug!(url = %robots_url, status = %response.status(), "No robots.txt");
        return Ok(None);
    }

    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => {
            warn!(url = %robots_url, error = %e, "robots.txt body read failed");
            return Ok(None);
        }
    };

    cache.put(CacheKeyspace::Robots, domain, &text, ttl)?;

    Ok(Some(parse_robots(&text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl_delay_and_sitemaps() {
        let text = "User-agent: *\n\
                    Crawl-delay: 5\n\
                    Disallow: /admin\n\
                    Sitemap: https://example.com/sitemap.xml\n\
                    Sitemap: https://example.com/news-sitemap.xml\n";
        let info = parse_robots(text);
        assert_eq!(info.crawl_delay, Some(5.0));
        assert_eq!(info.sitemaps.len(), 2);
        assert_eq!(info.sitemaps[0], "https://example.com/sitemap.xml");
    }

    #[test]
    fn test_parse_takes_largest_delay() {
        let text = "Crawl-delay: 2\nCrawl-delay: 8\nCrawl-delay: 4\n";
        assert_eq!(parse_robots(text).crawl_delay, Some(8.0));
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        let text = "###\nnot a directive\nCrawl-delay: fast\nSitemap:\n";
        let info = parse_robots(text);
        assert_eq!(info.crawl_delay, None);
        assert!(info.sitemaps.is_empty());
    }

    #[test]
    fn test_parse_case_insensitive() {
        let info = parse_robots("CRAWL-DELAY: 3\nsitemap: https://e.com/s.xml\n");
        assert_eq!(info.crawl_delay, Some(3.0));
        assert_eq!(info.sitemaps.len(), 1);
    }
}
