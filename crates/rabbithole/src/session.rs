//! Session state for one crawl run.
//!
//! A session owns everything learned during a single rabbithole descent:
//! visited URLs, accepted nodes, rejection counts, and the depth/time
//! budgets. Nothing in here outlives the run; repeat crawls start clean.

use shared::{KnowledgeNode, WeightedKeyword};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

/// Nodes at or above this relevance are highlights in the summary
pub const HIGH_RELEVANCE_THRESHOLD: f64 = 7.0;

/// Mutable state for one crawl run
pub struct CrawlSession {
    pub keywords: Vec<WeightedKeyword>,
    max_depth: u32,
    time_limit: Duration,
    started: Instant,

    visited: HashSet<String>,
    nodes: Vec<KnowledgeNode>,
    pages_rejected: usize,
}

impl CrawlSession {
    pub fn new(keywords: Vec<WeightedKeyword>, max_depth: u32, time_limit: Duration) -> Self {
        Self {
            keywords,
            max_depth,
            time_limit,
            started: Instant::now(),
            visited: HashSet::new(),
            nodes: Vec::new(),
            pages_rejected: 0,
        }
    }

    /// True when the URL was already visited this session. Marks it
    /// visited either way, so each URL is attempted at most once.
    pub fn check_and_mark_visited(&mut self, url: &str) -> bool {
        !self.visited.insert(url.to_string())
    }

    pub fn depth_exhausted(&self, depth: u32) -> bool {
        depth > self.max_depth
    }

    pub fn time_exhausted(&self) -> bool {
        self.started.elapsed() >= self.time_limit
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn record_rejection(&mut self) {
        self.pages_rejected += 1;
    }

    pub fn add_node(&mut self, node: KnowledgeNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[KnowledgeNode] {
        &self.nodes
    }

    pub fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    /// Consume the session into its final summary
    pub fn finish(self) -> SessionSummary {
        let mut nodes_per_depth = BTreeMap::new();
        let mut high_relevance_nodes = 0;
        let mut total_relevance = 0.0;
        let mut max_relevance = 0.0f64;
        let mut topics = HashSet::new();

        for node in &self.nodes {
            *nodes_per_depth.entry(node.depth).or_insert(0usize) += 1;
            total_relevance += node.relevance_score;
            max_relevance = max_relevance.max(node.relevance_score);
            if node.relevance_score >= HIGH_RELEVANCE_THRESHOLD {
                high_relevance_nodes += 1;
            }
            for topic in &node.topics {
                topics.insert(topic.clone());
            }
        }

        let average_relevance = if self.nodes.is_empty() {
            0.0
        } else {
            total_relevance / self.nodes.len() as f64
        };

        SessionSummary {
            pages_visited: self.visited.len(),
            pages_rejected: self.pages_rejected,
            nodes_per_depth,
            high_relevance_nodes,
            average_relevance,
            max_relevance,
            distinct_topics: topics.len(),
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            nodes: self.nodes,
        }
    }
}

/// What one crawl run produced
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub nodes: Vec<KnowledgeNode>,
    pub pages_visited: usize,
    pub pages_rejected: usize,
    /// Accepted node counts keyed by depth
    pub nodes_per_depth: BTreeMap<u32, usize>,
    /// Nodes at or above the high-relevance threshold
    pub high_relevance_nodes: usize,
    pub average_relevance: f64,
    pub max_relevance: f64,
    /// Distinct topics across all accepted nodes
    pub distinct_topics: usize,
    pub elapsed_seconds: f64,
}
