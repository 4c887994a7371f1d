//! The recursive crawler itself.

use crate::extract::{self, PageExtract, RelatedLink};
use crate::scoring;
use crate::session::{CrawlSession, SessionSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use shared::config::CrawlerConfig;
use shared::{KnowledgeNode, WeightedKeyword};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build a node from an extracted page, or None when the page fails the
/// content-length or relevance gates. Pure, so the gates are testable.
pub fn node_from_extract(
    url: &str,
    depth: u32,
    extract: PageExtract,
    keywords: &[WeightedKeyword],
    config: &CrawlerConfig,
) -> Option<KnowledgeNode> {
    if extract.content.len() < config.min_content_length {
        debug!(url = url, bytes = extract.content.len(), "Rejected: too little content");
        return None;
    }

    let relevance = scoring::relevance_score(&extract.title, &extract.content, keywords);
    if relevance < config.relevance_threshold {
        debug!(url = url, relevance = relevance, "Rejected: below relevance threshold");
        return None;
    }

    let mut content = extract.content;
    if content.len() > config.max_content_length {
        // Truncate on a char boundary
        let cut = (0..=config.max_content_length)
            .rev()
            .find(|i| content.is_char_boundary(*i))
            .unwrap_or(0);
        content.truncate(cut);
    }

    Some(KnowledgeNode {
        url: url.to_string(),
        title: extract.title,
        content,
        topics: extract.topics,
        related_links: extract.links.into_iter().map(|l| l.url).collect(),
        depth,
        relevance_score: relevance,
        scraped_at: Utc::now(),
    })
}

/// Recursive relevance-guided crawler.
///
/// Each accepted page contributes a knowledge node; its best-ranked links
/// are followed depth-first until the depth or time budget runs out.
pub struct RabbitholeCrawler {
    client: Client,
    config: CrawlerConfig,
}

impl RabbitholeCrawler {
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Run one crawl session from a seed URL.
    pub async fn crawl(
        &self,
        seed_url: &str,
        keywords: Vec<WeightedKeyword>,
    ) -> Result<SessionSummary> {
        let mut session = CrawlSession::new(
            keywords,
            self.config.max_depth,
            Duration::from_secs(self.config.time_limit_seconds),
        );

        info!(
            seed = seed_url,
            max_depth = self.config.max_depth,
            time_limit_s = self.config.time_limit_seconds,
            keywords = session.keywords.len(),
            "Starting rabbithole crawl"
        );

        self.follow_rabbithole(&mut session, seed_url.to_string(), 0)
            .await;

        let summary = session.finish();
        info!(
            nodes = summary.nodes.len(),
            visited = summary.pages_visited,
            rejected = summary.pages_rejected,
            high_relevance = summary.high_relevance_nodes,
            elapsed_s = format!("{:.1}", summary.elapsed_seconds),
            "Crawl session finished"
        );

        Ok(summary)
    }

    /// One step of the descent. Budget gates run before any network I/O,
    /// so an exhausted session never fetches. Every gated-out source
    /// counts as rejected.
    async fn follow_rabbithole(&self, session: &mut CrawlSession, url: String, depth: u32) {
        if session.depth_exhausted(depth) {
            debug!(url = %url, depth = depth, "Depth budget exhausted");
            session.record_rejection();
            return;
        }
        if session.time_exhausted() {
            debug!(url = %url, elapsed_s = session.elapsed().as_secs(), "Time budget exhausted");
            session.record_rejection();
            return;
        }
        if session.check_and_mark_visited(&url) {
            session.record_rejection();
            return;
        }

        let (node, links) = match self.scrape_page(session, &url, depth).await {
            Some(scraped) => scraped,
            None => return,
        };

        let ranked = scoring::rank_links(&links, &session.keywords);
        let to_follow: Vec<String> = ranked
            .into_iter()
            .take(self.config.branch_factor)
            .collect();

        debug!(
            url = %url,
            depth = depth,
            relevance = node.relevance_score,
            following = to_follow.len(),
            "Node accepted"
        );
        session.add_node(node);

        for link in to_follow {
            Box::pin(self.follow_rabbithole(session, link, depth + 1)).await;
        }
    }

    /// Fetch and evaluate one page. Any failure or gate rejection counts
    /// as a rejection and yields None; it never aborts the session.
    async fn scrape_page(
        &self,
        session: &mut CrawlSession,
        url: &str,
        depth: u32,
    ) -> Option<(KnowledgeNode, Vec<RelatedLink>)> {
        tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;

        let html = match self.fetch_with_retry(url).await {
            Some(html) => html,
            None => {
                session.record_rejection();
                return None;
            }
        };

        // Parsing is synchronous: the parsed document is never held
        // across an await point
        let extract = extract::parse_page(
            &html,
            url,
            self.config.max_topics,
            self.config.max_related_links,
        );

        // Anchor text feeds link ranking only; the node keeps bare URLs
        let links = extract.links.clone();
        match node_from_extract(url, depth, extract, &session.keywords, &self.config) {
            Some(node) => Some((node, links)),
            None => {
                session.record_rejection();
                None
            }
        }
    }

    /// Fetch a page with bounded retries. 429 and 5xx responses and
    /// transport errors back off exponentially; 4xx gives up immediately.
    async fn fetch_with_retry(&self, url: &str) -> Option<String> {
        let mut backoff = Duration::from_millis(self.config.retry_delay_ms);

        for attempt in 0..=self.config.max_fetch_retries {
            if attempt > 0 {
                debug!(url = url, attempt = attempt, backoff_ms = backoff.as_millis() as u64, "Retrying fetch");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            let response = match self.client.get(url).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = url, attempt = attempt, error = %e, "Fetch failed");
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                warn!(url = url, status = %status, "Retriable response");
                continue;
            }
            if !status.is_success() {
                debug!(url = url, status = %status, "Non-success response");
                return None;
            }

            match response.text().await {
                Ok(html) => return Some(html),
                Err(e) => {
                    warn!(url = url, error = %e, "Body read failed");
                    continue;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<WeightedKeyword> {
        vec![WeightedKeyword::new("rust", 2.0)]
    }

    fn page(content_len: usize, with_keyword: bool) -> PageExtract {
        let filler = if with_keyword { "rust " } else { "misc " };
        PageExtract {
            title: if with_keyword {
                "Rust notes".to_string()
            } else {
                "Notes".to_string()
            },
            content: filler.repeat(content_len / 5),
            topics: vec!["notes".to_string()],
            links: vec![RelatedLink {
                url: "https://example.com/next".to_string(),
                text: "Next page".to_string(),
            }],
        }
    }

    #[test]
    fn test_short_content_rejected() {
        let config = CrawlerConfig::default();
        let node = node_from_extract(
            "https://example.com/a",
            0,
            page(50, true),
            &keywords(),
            &config,
        );
        assert!(node.is_none());
    }

    #[test]
    fn test_irrelevant_content_rejected() {
        let config = CrawlerConfig::default();
        let node = node_from_extract(
            "https://example.com/a",
            0,
            page(600, false),
            &keywords(),
            &config,
        );
        assert!(node.is_none());
    }

    #[test]
    fn test_relevant_page_becomes_node() {
        let config = CrawlerConfig::default();
        let node = node_from_extract(
            "https://example.com/a",
            1,
            page(600, true),
            &keywords(),
            &config,
        )
        .expect("node accepted");
        assert_eq!(node.depth, 1);
        assert!(node.relevance_score >= config.relevance_threshold);
        assert_eq!(node.related_links.len(), 1);
    }

    #[test]
    fn test_content_truncated_to_limit() {
        let config = CrawlerConfig {
            max_content_length: 200,
            ..Default::default()
        };
        let node = node_from_extract(
            "https://example.com/a",
            0,
            page(600, true),
            &keywords(),
            &config,
        )
        .expect("node accepted");
        assert!(node.content.len() <= 200);
    }

    #[tokio::test]
    async fn test_exhausted_time_budget_never_fetches() {
        // Zero time budget: the session gate fires before any I/O, so the
        // unroutable seed URL is never touched
        let config = CrawlerConfig {
            time_limit_seconds: 0,
            ..Default::default()
        };
        let crawler = RabbitholeCrawler::new(config).unwrap();
        let summary = crawler
            .crawl("http://192.0.2.1/unroutable", keywords())
            .await
            .unwrap();
        assert!(summary.nodes.is_empty());
        assert_eq!(summary.pages_visited, 0);
        assert!(summary.pages_rejected >= 1);
    }

    #[tokio::test]
    async fn test_depth_budget_gate() {
        let config = CrawlerConfig {
            max_depth: 1,
            ..Default::default()
        };
        let crawler = RabbitholeCrawler::new(config).unwrap();
        let mut session = CrawlSession::new(keywords(), 1, Duration::from_secs(60));

        // Past the depth budget, the step rejects without fetching
        crawler
            .follow_rabbithole(&mut session, "http://192.0.2.1/unroutable".to_string(), 2)
            .await;
        assert_eq!(session.pages_visited(), 0);

        let summary = session.finish();
        assert_eq!(summary.pages_rejected, 1);
    }

    #[tokio::test]
    async fn test_revisited_url_counts_as_rejection() {
        let crawler = RabbitholeCrawler::new(CrawlerConfig::default()).unwrap();
        let mut session = CrawlSession::new(keywords(), 3, Duration::from_secs(60));

        let url = "http://192.0.2.1/unroutable".to_string();
        assert!(!session.check_and_mark_visited(&url));

        // The second encounter hits the visited gate and is rejected
        // before any fetch
        crawler.follow_rabbithole(&mut session, url, 0).await;
        assert_eq!(session.pages_visited(), 1);

        let summary = session.finish();
        assert_eq!(summary.pages_rejected, 1);
    }
}
