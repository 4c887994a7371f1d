//! HTML extraction helpers.
//!
//! All functions here are synchronous and operate on an owned HTML string:
//! `scraper::Html` is not Send, so parsed documents must never be held
//! across an await point. The crawler calls [`parse_page`] once per fetch
//! and only keeps the owned results.

use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Words too common to be useful topics
const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "been", "were", "their", "about", "which", "would",
    "there", "could", "other", "more", "some", "also", "into", "they", "them", "then", "than",
    "when", "what", "where", "your", "will", "page", "here", "home", "said", "like", "just",
    "only", "over", "such", "after", "most", "make", "made", "many", "much", "very", "well",
];

/// URL fragments that mark navigation chrome rather than content
const EXCLUDED_LINK_FRAGMENTS: &[&str] = &[
    "login",
    "signin",
    "signup",
    "register",
    "subscribe",
    "privacy",
    "terms",
    "cookie",
    "account",
    "cart",
    "checkout",
    "javascript:",
    "mailto:",
];

/// One outbound link with its anchor text. The anchor text often names
/// the linked content better than the URL does, so ranking sees both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedLink {
    pub url: String,
    pub text: String,
}

/// Everything extracted from one page in a single parse
#[derive(Debug, Clone, Default)]
pub struct PageExtract {
    pub title: String,
    /// Body text joined from content elements
    pub content: String,
    pub topics: Vec<String>,
    /// Same-domain absolute links, content-like ones first
    pub links: Vec<RelatedLink>,
}

/// Parse a page once and extract title, body text, topics, and links.
pub fn parse_page(html: &str, page_url: &str, max_topics: usize, max_links: usize) -> PageExtract {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let content = extract_content(&document);
    let topics = extract_topics(&document, &content, max_topics);
    let links = extract_links(&document, page_url, max_links);

    PageExtract {
        title,
        content,
        topics,
        links,
    }
}

fn extract_title(document: &Html) -> String {
    for css in ["title", "h1"] {
        let selector = Selector::parse(css).unwrap();
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Body text from content-bearing elements, whitespace-normalized
fn extract_content(document: &Html) -> String {
    let selector = Selector::parse("p, h1, h2, h3, h4, li").unwrap();

    let mut parts = Vec::new();
    for element in document.select(&selector) {
        let text = element.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            parts.push(text);
        }
    }

    parts.join("\n")
}

/// Topics from three sources, in priority order: short header texts, the
/// meta keywords tag, then frequency-filtered content words.
fn extract_topics(document: &Html, content: &str, max_topics: usize) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();

    let header_selector = Selector::parse("h1, h2, h3").unwrap();
    for element in document.select(&header_selector) {
        let text = element.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let lowered = text.to_lowercase();
        // Long headers are sentences, not topics
        if !lowered.is_empty() && lowered.split(' ').count() <= 4 && !topics.contains(&lowered) {
            topics.push(lowered);
        }
    }

    let meta_selector = Selector::parse(r#"meta[name="keywords"]"#).unwrap();
    if let Some(element) = document.select(&meta_selector).next() {
        if let Some(keywords) = element.value().attr("content") {
            for keyword in keywords.split(',') {
                let keyword = keyword.trim().to_lowercase();
                if !keyword.is_empty() && !topics.contains(&keyword) {
                    topics.push(keyword);
                }
            }
        }
    }

    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for word in content.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.len() >= 4 && !STOP_WORDS.contains(&word) {
            *frequencies.entry(word.to_string()).or_insert(0) += 1;
        }
    }
    let mut frequent: Vec<(String, usize)> = frequencies
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .collect();
    frequent.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (word, _) in frequent {
        if !topics.contains(&word) {
            topics.push(word);
        }
    }

    topics.truncate(max_topics);
    topics
}

/// Same-domain absolute links with navigation chrome filtered out.
/// Content-looking links (by URL or anchor text) are moved to the front
/// before truncation.
fn extract_links(document: &Html, page_url: &str, max_links: usize) -> Vec<RelatedLink> {
    let base = match Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };
    let domain = base.host_str().unwrap_or_default().to_string();

    let selector = Selector::parse("a[href]").unwrap();
    let mut links: Vec<RelatedLink> = Vec::new();

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };

        let resolved = match base.join(href) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        if resolved.host_str() != Some(domain.as_str()) {
            continue;
        }

        let mut resolved = resolved;
        resolved.set_fragment(None);
        let url = resolved.to_string();

        let url_lower = url.to_lowercase();
        if EXCLUDED_LINK_FRAGMENTS.iter().any(|f| url_lower.contains(f)) {
            continue;
        }
        if url == page_url || links.iter().any(|l| l.url == url) {
            continue;
        }

        let text = element.text().collect::<String>();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        links.push(RelatedLink { url, text });
    }

    // Stable partition: content-like links first
    let (content_links, rest): (Vec<RelatedLink>, Vec<RelatedLink>) =
        links.into_iter().partition(|l| {
            let url = l.url.to_lowercase();
            let text = l.text.to_lowercase();
            crate::scoring::CONTENT_URL_HINTS
                .iter()
                .any(|h| url.contains(h) || text.contains(h))
        });

    let mut ordered = content_links;
    ordered.extend(rest);
    ordered.truncate(max_links);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Rust Memory Safety</title>
            <meta name="keywords" content="rust, ownership, borrowing">
          </head>
          <body>
            <nav><a href="/login">Log in</a><a href="/subscribe">Subscribe</a></nav>
            <h1>Rust Memory Safety</h1>
            <h2>Ownership</h2>
            <p>Ownership ownership rules are checked at compile time.</p>
            <p>Borrowing borrowing lets code reference data without taking it.</p>
            <ul><li>No garbage collector</li></ul>
            <a href="/blog/lifetimes">Lifetimes</a>
            <a href="/about">About</a>
            <a href="https://other.example.net/post">External</a>
            <a href="/blog/lifetimes">Lifetimes again</a>
          </body>
        </html>"#;

    #[test]
    fn test_parse_page_title_and_content() {
        let extract = parse_page(PAGE, "https://example.com/rust", 25, 15);
        assert_eq!(extract.title, "Rust Memory Safety");
        assert!(extract.content.contains("checked at compile time"));
        assert!(extract.content.contains("No garbage collector"));
        // Nav anchors are not content elements
        assert!(!extract.content.contains("Log in"));
    }

    #[test]
    fn test_topics_from_headers_meta_and_frequency() {
        let extract = parse_page(PAGE, "https://example.com/rust", 25, 15);
        assert!(extract.topics.contains(&"rust memory safety".to_string()));
        assert!(extract.topics.contains(&"borrowing".to_string()));
        // "ownership" appears as header, meta keyword, and frequent word; once
        let count = extract
            .topics
            .iter()
            .filter(|t| t.as_str() == "ownership")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_topics_respect_limit() {
        let extract = parse_page(PAGE, "https://example.com/rust", 2, 15);
        assert_eq!(extract.topics.len(), 2);
    }

    #[test]
    fn test_links_same_domain_filtered_and_deduped() {
        let extract = parse_page(PAGE, "https://example.com/rust", 25, 15);
        let urls: Vec<&str> = extract.links.iter().map(|l| l.url.as_str()).collect();
        assert!(urls.contains(&"https://example.com/blog/lifetimes"));
        assert!(urls.contains(&"https://example.com/about"));
        assert!(!urls.iter().any(|u| u.contains("other.example.net")));
        assert!(!urls.iter().any(|u| u.contains("login")));
        assert!(!urls.iter().any(|u| u.contains("subscribe")));
        assert_eq!(urls.iter().filter(|u| u.contains("lifetimes")).count(), 1);
    }

    #[test]
    fn test_links_carry_anchor_text() {
        let extract = parse_page(PAGE, "https://example.com/rust", 25, 15);
        let lifetimes = extract
            .links
            .iter()
            .find(|l| l.url == "https://example.com/blog/lifetimes")
            .expect("link extracted");
        assert_eq!(lifetimes.text, "Lifetimes");
    }

    #[test]
    fn test_content_links_ordered_first() {
        let extract = parse_page(PAGE, "https://example.com/rust", 25, 15);
        assert_eq!(extract.links[0].url, "https://example.com/blog/lifetimes");
    }

    #[test]
    fn test_anchor_text_marks_content_links() {
        // The URL gives nothing away; only the anchor text does
        let html = r#"
            <html><body>
              <a href="/about">About</a>
              <a href="/p/12345">Breaking analysis of the outage</a>
            </body></html>"#;
        let extract = parse_page(html, "https://example.com/", 25, 15);
        assert_eq!(extract.links[0].url, "https://example.com/p/12345");
    }

    #[test]
    fn test_empty_document() {
        let extract = parse_page("", "https://example.com/", 25, 15);
        assert!(extract.title.is_empty());
        assert!(extract.content.is_empty());
        assert!(extract.links.is_empty());
    }
}
