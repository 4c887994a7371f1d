//! Interfaces to external collaborators.
//!
//! The keyword-expansion service and the long-term corpus writer live outside
//! this engine. Only their contracts are defined here, plus the term-list
//! parsing both sides agree on.

use crate::models::{KnowledgeNode, WeightedKeyword};
use crate::Result;
use async_trait::async_trait;

/// Default weight for terms returned by the expansion service
pub const EXPANDED_TERM_WEIGHT: f64 = 1.0;
/// Seed keywords supplied by the caller are reinforced
pub const SEED_TERM_WEIGHT: f64 = 2.0;

/// Expands a topic prompt into a weighted keyword list
#[async_trait]
pub trait KeywordExpander: Send + Sync {
    async fn expand(&self, topic: &str) -> Result<Vec<WeightedKeyword>>;
}

/// Parse a comma-delimited term list from the expansion service.
///
/// Every term gets weight 1.0; terms that also appear in `seeds` are
/// reinforced to 2.0. Seeds missing from the response are appended.
pub fn parse_term_list(raw: &str, seeds: &[String]) -> Vec<WeightedKeyword> {
    let mut keywords: Vec<WeightedKeyword> = Vec::new();

    for term in raw.split(',') {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            continue;
        }
        if keywords.iter().any(|k| k.term == term) {
            continue;
        }
        let weight = if seeds.iter().any(|s| s.to_lowercase() == term) {
            SEED_TERM_WEIGHT
        } else {
            EXPANDED_TERM_WEIGHT
        };
        keywords.push(WeightedKeyword::new(term, weight));
    }

    for seed in seeds {
        let seed = seed.trim().to_lowercase();
        if !seed.is_empty() && !keywords.iter().any(|k| k.term == seed) {
            keywords.push(WeightedKeyword::new(seed, SEED_TERM_WEIGHT));
        }
    }

    keywords
}

/// A knowledge node flattened for the corpus writer
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CorpusRecord {
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub topics: Vec<String>,
    pub quality_score: f64,
    pub scraped_at: chrono::DateTime<chrono::Utc>,
}

impl From<&KnowledgeNode> for CorpusRecord {
    fn from(node: &KnowledgeNode) -> Self {
        Self {
            id: node.url.clone(),
            source_url: node.url.clone(),
            title: node.title.clone(),
            content: node.content.clone(),
            topics: node.topics.clone(),
            quality_score: node.relevance_score,
            scraped_at: node.scraped_at,
        }
    }
}

/// Durable storage for scraped knowledge. This engine only calls it,
/// never manages its storage format.
#[async_trait]
pub trait CorpusWriter: Send + Sync {
    async fn write(&self, record: CorpusRecord) -> Result<()>;
}

/// Discards every record. Used when no corpus backend is wired up.
pub struct NullCorpusWriter;

#[async_trait]
impl CorpusWriter for NullCorpusWriter {
    async fn write(&self, record: CorpusRecord) -> Result<()> {
        tracing::debug!(url = %record.source_url, "Corpus writer not configured, dropping record");
        Ok(())
    }
}
