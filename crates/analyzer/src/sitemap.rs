//! Sitemap discovery and page-count estimation.
//!
//! Probes a fixed list of conventional sitemap paths, parses anything that
//! resolves as an XML sitemap or sitemap index, and accumulates a rough
//! page-count estimate. Sub-sitemaps are not fetched; each index entry is
//! counted with a flat multiplier, so the estimate is an order-of-magnitude
//! signal only.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{AnalysisCache, CacheKeyspace};
use tracing::{debug, warn};

/// Conventional sitemap locations probed on every analysis
pub const SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap-index.xml",
    "/wp-sitemap.xml",
    "/sitemap/sitemap.xml",
];

/// Pages assumed per unfetched sub-sitemap in an index
pub const SUB_SITEMAP_PAGE_MULTIPLIER: u64 = 1000;

/// Entry counts for one parsed sitemap document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapCounts {
    /// Direct <url> entries
    pub url_entries: u64,
    /// <sitemap> entries in an index document
    pub index_entries: u64,
}

impl SitemapCounts {
    /// Direct entries 1:1, index entries at the flat multiplier
    pub fn estimated_pages(&self) -> u64 {
        self.url_entries + self.index_entries * SUB_SITEMAP_PAGE_MULTIPLIER
    }
}

/// What sitemap discovery learned about a site
#[derive(Debug, Clone, Default)]
pub struct SitemapSummary {
    /// Sitemap URLs that resolved and parsed
    pub sitemap_urls: Vec<String>,
    pub estimated_pages: u64,
}

/// Parse an XML sitemap or sitemap-index document into entry counts
pub fn parse_sitemap(xml: &str) -> Result<SitemapCounts> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut counts = SitemapCounts::default();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.local_name().as_ref() {
                    b"urlset" | b"sitemapindex" => saw_root = true,
                    b"url" => counts.url_entries += 1,
                    b"sitemap" => counts.index_entries += 1,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e).context("Malformed sitemap XML"),
            _ => {}
        }
    }

    if !saw_root {
        anyhow::bail!("Document is not a sitemap (no urlset/sitemapindex root)");
    }

    Ok(counts)
}

/// Probe conventional sitemap paths under `base_url` and accumulate an
/// estimated page count. Each resolved sitemap's counts are cached per URL.
pub async fn discover(
    client: &Client,
    base_url: &str,
    cache: &AnalysisCache,
    ttl: chrono::Duration,
) -> SitemapSummary {
    let base = base_url.trim_end_matches('/');
    let mut summary = SitemapSummary::default();

    for path in SITEMAP_PATHS {
        let sitemap_url = format!("{}{}", base, path);

        let counts = match cached_or_fetch(client, &sitemap_url, cache, ttl).await {
            Ok(Some(counts)) => counts,
            Ok(None) => continue,
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "Sitemap probe failed");
                continue;
            }
        };

        debug!(
            url = %sitemap_url,
            urls = counts.url_entries,
            indexes = counts.index_entries,
            "Sitemap resolved"
        );
        summary.sitemap_urls.push(sitemap_url);
        summary.estimated_pages += counts.estimated_pages();
    }

    summary
}

async fn cached_or_fetch(
    client: &Client,
    sitemap_url: &str,
    cache: &AnalysisCache,
    ttl: chrono::Duration,
) -> Result<Option<SitemapCounts>> {
    if let Some(counts) = cache.get::<SitemapCounts>(CacheKeyspace::Sitemap, sitemap_url)? {
        return Ok(Some(counts));
    }

    let response = match client.get(sitemap_url).send().await {
        Ok(r) => r,
        Err(_) => return Ok(None),
    };
    if !response.status().is_success() {
        return Ok(None);
    }

    let body = match response.text().await {
        Ok(t) => t,
        Err(_) => return Ok(None),
    };

    // Malformed XML is a skipped signal, not an analysis failure
    let counts = match parse_sitemap(&body) {
        Ok(c) => c,
        Err(e) => {
            debug!(url = %sitemap_url, error = %e, "Skipping unparseable sitemap");
            return Ok(None);
        }
    };

    cache.put(CacheKeyspace::Sitemap, sitemap_url, &counts, ttl)?;
    Ok(Some(counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <url><loc>https://example.com/a</loc></url>
            <url><loc>https://example.com/b</loc></url>
            <url><loc>https://example.com/c</loc></url>
        </urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
            <sitemap><loc>https://example.com/sitemap-2.xml</loc></sitemap>
        </sitemapindex>"#;

    #[test]
    fn test_parse_urlset() {
        let counts = parse_sitemap(URLSET).unwrap();
        assert_eq!(counts.url_entries, 3);
        assert_eq!(counts.index_entries, 0);
        assert_eq!(counts.estimated_pages(), 3);
    }

    #[test]
    fn test_parse_index_uses_multiplier() {
        let counts = parse_sitemap(INDEX).unwrap();
        assert_eq!(counts.index_entries, 2);
        assert_eq!(counts.estimated_pages(), 2 * SUB_SITEMAP_PAGE_MULTIPLIER);
    }

    #[test]
    fn test_parse_rejects_non_sitemap() {
        assert!(parse_sitemap("<html><body>404</body></html>").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_xml() {
        assert!(parse_sitemap("<urlset><url></urlset").is_err());
    }
}
