//! Pre-flight website analysis and strategy optimization.
//!
//! This library profiles a target site with concurrent probes, computes a
//! risk-weighted characteristics record, and derives an executable scraping
//! strategy from it.

pub mod analyzer;
pub mod optimizer;
pub mod platform;
pub mod probes;
pub mod robots;
pub mod sitemap;

pub use analyzer::WebsiteAnalyzer;
pub use optimizer::{CrawlGoals, StrategyOptimizer};
