//! Rabbithole crawler: recursive, relevance-scored knowledge acquisition.
//!
//! Starting from a seed URL, the crawler scores each page against a set of
//! weighted keywords, keeps what clears the relevance threshold, and follows
//! the most promising same-domain links until depth, time, or link budgets
//! run out. Everything learned in one run stays in that run's session.

pub mod crawler;
pub mod extract;
pub mod scoring;
pub mod session;

pub use crawler::RabbitholeCrawler;
pub use session::{CrawlSession, SessionSummary};
