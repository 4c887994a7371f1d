//! Relevance scoring for pages and link ranking.
//!
//! All scoring is pure text heuristics over lowercased title, content,
//! URLs, and anchor text, so every rule is testable without a network.

use crate::extract::RelatedLink;
use shared::WeightedKeyword;

/// Terms whose presence suggests substantive editorial content
pub const QUALITY_INDICATORS: &[&str] = &[
    "article",
    "breaking",
    "analysis",
    "report",
    "study",
    "research",
    "exclusive",
    "investigation",
    "interview",
    "review",
];

/// URL fragments that suggest a link points at content, not chrome
pub const CONTENT_URL_HINTS: &[&str] = &[
    "article", "blog", "post", "news", "story", "research", "analysis", "report",
];

/// Scoring weights, kept in one place for calibration
pub mod weights {
    /// Per keyword appearing in the title
    pub const TITLE_MATCH: f64 = 5.0;
    /// Per content occurrence of a keyword
    pub const CONTENT_OCCURRENCE: f64 = 0.5;
    /// Content contribution cap per keyword, before the keyword weight
    pub const CONTENT_CAP_PER_KEYWORD: f64 = 3.0;
    /// Per quality indicator present in the content
    pub const QUALITY_INDICATOR: f64 = 0.3;
    /// Substantive-length bonus thresholds
    pub const LENGTH_BONUS: f64 = 0.5;
    pub const LENGTH_TIER_1: usize = 500;
    pub const LENGTH_TIER_2: usize = 2000;
    /// Very long pages are often aggregations; dampen them
    pub const LONG_PAGE_DAMPENING_THRESHOLD: usize = 5000;
    pub const LONG_PAGE_DAMPENING: f64 = 0.8;
    pub const MAX_SCORE: f64 = 10.0;

    /// Link-ranking weights
    pub const LINK_KEYWORD: f64 = 2.0;
    pub const LINK_CONTENT_HINT: f64 = 1.0;
}

/// Score one page against the session keywords, 0..=10.
pub fn relevance_score(title: &str, content: &str, keywords: &[WeightedKeyword]) -> f64 {
    let title_lower = title.to_lowercase();
    let content_lower = content.to_lowercase();

    let mut score = 0.0;

    for keyword in keywords {
        if title_lower.contains(&keyword.term) {
            score += weights::TITLE_MATCH * keyword.weight;
        }

        let occurrences = content_lower.matches(&keyword.term).count() as f64;
        let content_part =
            (occurrences * weights::CONTENT_OCCURRENCE).min(weights::CONTENT_CAP_PER_KEYWORD);
        score += content_part * keyword.weight;
    }

    for indicator in QUALITY_INDICATORS {
        if content_lower.contains(indicator) {
            score += weights::QUALITY_INDICATOR;
        }
    }

    if content.len() > weights::LENGTH_TIER_1 {
        score += weights::LENGTH_BONUS;
    }
    if content.len() > weights::LENGTH_TIER_2 {
        score += weights::LENGTH_BONUS;
    }

    if content.len() > weights::LONG_PAGE_DAMPENING_THRESHOLD {
        score *= weights::LONG_PAGE_DAMPENING;
    }

    score.min(weights::MAX_SCORE)
}

/// Rank candidate links by crawl promise: keyword hits in the URL or
/// anchor text weigh double a generic content hint. Ties keep input
/// order, so ranking is deterministic.
pub fn rank_links(links: &[RelatedLink], keywords: &[WeightedKeyword]) -> Vec<String> {
    let mut scored: Vec<(f64, usize, &RelatedLink)> = links
        .iter()
        .enumerate()
        .map(|(i, link)| (link_score(link, keywords), i, link))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    scored
        .into_iter()
        .map(|(_, _, link)| link.url.clone())
        .collect()
}

fn link_score(link: &RelatedLink, keywords: &[WeightedKeyword]) -> f64 {
    let url_lower = link.url.to_lowercase();
    let text_lower = link.text.to_lowercase();
    let mut score = 0.0;

    for keyword in keywords {
        if url_lower.contains(&keyword.term) || text_lower.contains(&keyword.term) {
            score += weights::LINK_KEYWORD * keyword.weight;
        }
    }

    for hint in CONTENT_URL_HINTS {
        if url_lower.contains(hint) || text_lower.contains(hint) {
            score += weights::LINK_CONTENT_HINT;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<WeightedKeyword> {
        vec![
            WeightedKeyword::new("rust", 2.0),
            WeightedKeyword::new("async", 1.0),
        ]
    }

    #[test]
    fn test_title_match_dominates() {
        let titled = relevance_score("Rust in production", "short body", &keywords());
        let untitled = relevance_score("Production notes", "short body", &keywords());
        assert!(titled >= untitled + weights::TITLE_MATCH);
    }

    #[test]
    fn test_content_contribution_capped() {
        let spam = "rust ".repeat(200);
        let normal = "rust ".repeat(10);
        let spam_score = relevance_score("", &spam, &keywords());
        let normal_score = relevance_score("", &normal, &keywords());
        // Repetition past the cap buys only length bonuses
        assert!(spam_score - normal_score <= 2.0 * weights::LENGTH_BONUS + 0.5);
    }

    #[test]
    fn test_score_capped_at_ten() {
        let loaded = format!(
            "rust async {} {}",
            QUALITY_INDICATORS.join(" "),
            "rust async filler ".repeat(100)
        );
        let score = relevance_score("rust async", &loaded, &keywords());
        assert!(score <= 10.0);
    }

    #[test]
    fn test_irrelevant_page_scores_low() {
        let score = relevance_score(
            "Cake recipes",
            "flour sugar butter eggs vanilla",
            &keywords(),
        );
        assert!(score < 1.0);
    }

    #[test]
    fn test_quality_indicators_add_bonus() {
        let plain = relevance_score("", "rust is a language", &keywords());
        let quality = relevance_score("", "rust is a language analysis report", &keywords());
        assert!(quality > plain);
    }

    fn link(url: &str, text: &str) -> RelatedLink {
        RelatedLink {
            url: url.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_rank_links_prefers_keyword_urls() {
        let links = vec![
            link("https://example.com/about", "About us"),
            link("https://example.com/blog/rust-patterns", "Patterns"),
            link("https://example.com/news/update", "Update"),
        ];
        let ranked = rank_links(&links, &keywords());
        assert_eq!(ranked[0], "https://example.com/blog/rust-patterns");
    }

    #[test]
    fn test_rank_links_sees_anchor_text() {
        // The opaque URL would score zero on its own
        let links = vec![
            link("https://example.com/about", "About us"),
            link("https://example.com/p/12345", "Breaking rust analysis"),
        ];
        let ranked = rank_links(&links, &keywords());
        assert_eq!(ranked[0], "https://example.com/p/12345");
    }

    #[test]
    fn test_rank_links_is_deterministic_on_ties() {
        let links = vec![
            link("https://example.com/a", ""),
            link("https://example.com/b", ""),
        ];
        let ranked = rank_links(&links, &keywords());
        assert_eq!(ranked[0], "https://example.com/a");
        assert_eq!(ranked[1], "https://example.com/b");
    }
}
