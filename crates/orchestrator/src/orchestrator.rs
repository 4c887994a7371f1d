//! Job execution and campaign control.

use crate::engine::{Engine, ExternalEngine, RabbitholeEngine};
use crate::pipeline;
use crate::registry::ScraperRegistry;
use futures::stream::{self, StreamExt};
use serde_json::json;
use shared::config::{CrawlerConfig, OrchestratorConfig};
use shared::{
    CampaignSummary, JobResult, JobStatus, ScrapingJob, WebsiteCharacteristics,
};
use site_analyzer::{CrawlGoals, StrategyOptimizer, WebsiteAnalyzer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Runs jobs against registered engines and aggregates campaigns.
///
/// Job execution never returns an error: every failure mode becomes a
/// failed [`JobResult`], so one bad job cannot sink a campaign.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    registry: ScraperRegistry,
    engines: HashMap<String, Arc<dyn Engine>>,
    analyzer: Option<WebsiteAnalyzer>,
}

impl JobOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        crawler_config: CrawlerConfig,
        analyzer: Option<WebsiteAnalyzer>,
    ) -> Self {
        let mut registry = ScraperRegistry::from_config(&config);
        let active = registry.verify();
        info!(
            engines = registry.engines().len(),
            active = active,
            "Engine registry initialized"
        );

        let mut engines: HashMap<String, Arc<dyn Engine>> = HashMap::new();
        engines.insert(
            "rabbithole".to_string(),
            Arc::new(RabbitholeEngine::new(crawler_config)),
        );
        for external in &config.external_engines {
            engines.insert(
                external.name.clone(),
                Arc::new(ExternalEngine::new(
                    external.name.clone(),
                    external.executable.clone(),
                    Duration::from_secs(config.engine_timeout_seconds),
                    PathBuf::from(&config.results_dir),
                )),
            );
        }

        Self {
            config,
            registry,
            engines,
            analyzer,
        }
    }

    /// Register an additional in-process engine.
    pub fn register_engine(&mut self, engine: Arc<dyn Engine>) {
        self.registry.register_native(engine.name(), Vec::new());
        self.engines.insert(engine.name().to_string(), engine);
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    /// Execute one job to a result. Never an Err: unknown engines,
    /// engine failures, and empty output all become failed results.
    pub async fn run_job(&self, mut job: ScrapingJob) -> JobResult {
        let start = Instant::now();
        info!(
            engine = %job.engine,
            url = %job.target_url,
            priority = job.priority,
            "Starting job"
        );

        let descriptor = match self.registry.get(&job.engine) {
            Some(d) => d,
            None => {
                return JobResult::failed(
                    &job,
                    start.elapsed().as_secs_f64(),
                    format!("Unknown engine: {}", job.engine),
                );
            }
        };
        if !descriptor.active {
            return JobResult::failed(
                &job,
                start.elapsed().as_secs_f64(),
                format!("Engine {} is inactive", job.engine),
            );
        }
        let engine = match self.engines.get(&job.engine) {
            Some(e) => Arc::clone(e),
            None => {
                return JobResult::failed(
                    &job,
                    start.elapsed().as_secs_f64(),
                    format!("Engine {} has no runner", job.engine),
                );
            }
        };

        let (analysis, strategy) = if self.config.analyze_before_run {
            self.preflight(&mut job).await
        } else {
            (None, None)
        };

        let items = match engine.run(&job).await {
            Ok(items) => items,
            Err(e) => {
                warn!(engine = %job.engine, url = %job.target_url, error = %e, "Job failed");
                let mut result =
                    JobResult::failed(&job, start.elapsed().as_secs_f64(), e.to_string());
                result.analysis = analysis;
                result.strategy = strategy;
                return result;
            }
        };

        let (items, quality) = match pipeline::process(items) {
            Ok(processed) => processed,
            Err(e) => {
                let mut result =
                    JobResult::failed(&job, start.elapsed().as_secs_f64(), e.to_string());
                result.analysis = analysis;
                result.strategy = strategy;
                return result;
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            engine = %job.engine,
            url = %job.target_url,
            items = items.len(),
            elapsed_s = format!("{:.1}", elapsed),
            "Job succeeded"
        );

        JobResult {
            engine: job.engine.clone(),
            target_url: job.target_url.clone(),
            status: JobStatus::Success,
            items_scraped: items.len(),
            execution_seconds: elapsed,
            analysis,
            strategy,
            quality: Some(quality),
            error: None,
        }
    }

    /// Pre-flight analysis: profile the target, derive a strategy, and
    /// fold its pacing into the job config. Analysis failure degrades to
    /// a conservative profile instead of failing the job.
    async fn preflight(
        &self,
        job: &mut ScrapingJob,
    ) -> (
        Option<WebsiteCharacteristics>,
        Option<shared::ScrapingStrategy>,
    ) {
        let analyzer = match &self.analyzer {
            Some(a) => a,
            None => return (None, None),
        };

        let characteristics = match analyzer.analyze(&job.target_url, false).await {
            Ok(c) => c,
            Err(e) => {
                warn!(url = %job.target_url, error = %e, "Pre-flight analysis failed, using conservative profile");
                let domain = url::Url::parse(&job.target_url)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.to_string()))
                    .unwrap_or_default();
                WebsiteCharacteristics::conservative(&job.target_url, &domain)
            }
        };

        let goals = CrawlGoals {
            keywords: job
                .config
                .get("keywords")
                .and_then(|v| v.as_str())
                .map(|s| {
                    s.split(',')
                        .map(|k| k.trim().to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            max_pages: job
                .config
                .get("max_pages")
                .and_then(|v| v.as_u64())
                .unwrap_or(50) as u32,
            high_throughput: false,
        };
        let strategy = StrategyOptimizer::new().optimize(&characteristics, &goals);

        // The analyzed delay paces the engine regardless of which engine runs
        job.config.insert(
            "delay_seconds".to_string(),
            json!(characteristics.recommended_delay_seconds),
        );

        (Some(characteristics), Some(strategy))
    }

    /// Run a campaign: jobs sorted by ascending priority value, executed
    /// under the configured concurrency bound.
    pub async fn run_campaign(
        &self,
        mut jobs: Vec<ScrapingJob>,
    ) -> (Vec<JobResult>, CampaignSummary) {
        let start = Instant::now();
        jobs.sort_by_key(|j| j.priority);

        info!(
            jobs = jobs.len(),
            max_concurrent = self.config.max_concurrent_jobs,
            "Starting campaign"
        );

        let results: Vec<JobResult> = stream::iter(jobs)
            .map(|job| self.run_job(job))
            .buffer_unordered(self.config.max_concurrent_jobs.max(1))
            .collect()
            .await;

        let summary = summarize(&results, start.elapsed().as_secs_f64());
        info!(
            total = summary.total_jobs,
            succeeded = summary.succeeded,
            failed = summary.failed,
            items = summary.total_items_scraped,
            elapsed_s = format!("{:.1}", summary.total_seconds),
            "Campaign finished"
        );

        (results, summary)
    }
}

/// Aggregate job results into a campaign summary. Item counts include
/// successful jobs only.
pub fn summarize(results: &[JobResult], total_seconds: f64) -> CampaignSummary {
    let succeeded = results.iter().filter(|r| r.is_success()).count();

    CampaignSummary {
        total_jobs: results.len(),
        succeeded,
        failed: results.len() - succeeded,
        total_items_scraped: results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.items_scraped)
            .sum(),
        total_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds with fixed items unless the URL contains "fail"
    struct FakeEngine {
        name: String,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, job: &ScrapingJob) -> Result<EngineOutput> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if job.target_url.contains("fail") {
                anyhow::bail!("synthetic failure");
            }
            Ok(vec![
                json!({"url": format!("{}/1", job.target_url), "title": "a", "content": "body"}),
                json!({"url": format!("{}/2", job.target_url), "title": "b", "content": "body"}),
            ])
        }
    }

    fn orchestrator(max_concurrent: usize) -> (JobOrchestrator, Arc<AtomicUsize>) {
        let config = OrchestratorConfig {
            max_concurrent_jobs: max_concurrent,
            analyze_before_run: false,
            ..Default::default()
        };
        let mut orchestrator = JobOrchestrator::new(config, CrawlerConfig::default(), None);
        let fake = FakeEngine::new("fake");
        let peak = Arc::clone(&fake.peak);
        orchestrator.register_engine(Arc::new(fake));
        (orchestrator, peak)
    }

    #[tokio::test]
    async fn test_unknown_engine_is_failed_result() {
        let (orchestrator, _) = orchestrator(2);
        let result = orchestrator
            .run_job(ScrapingJob::new("nonexistent", "https://example.com", 1))
            .await;
        assert_eq!(result.status, JobStatus::Failed);
        assert!(result.error.unwrap().contains("Unknown engine"));
    }

    #[tokio::test]
    async fn test_campaign_counts_and_items() {
        let (orchestrator, _) = orchestrator(2);
        let jobs = vec![
            ScrapingJob::new("fake", "https://example.com/ok1", 2),
            ScrapingJob::new("fake", "https://example.com/fail", 1),
            ScrapingJob::new("fake", "https://example.com/ok2", 3),
        ];

        let (results, summary) = orchestrator.run_campaign(jobs).await;
        assert_eq!(results.len(), 3);
        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        // Failed jobs contribute nothing to the item count
        assert_eq!(summary.total_items_scraped, 4);
    }

    #[tokio::test]
    async fn test_campaign_respects_concurrency_bound() {
        let (orchestrator, peak) = orchestrator(2);
        let jobs: Vec<ScrapingJob> = (0..6)
            .map(|i| ScrapingJob::new("fake", format!("https://example.com/{}", i), 1))
            .collect();

        let (_, summary) = orchestrator.run_campaign(jobs).await;
        assert_eq!(summary.succeeded, 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_campaign() {
        let (orchestrator, _) = orchestrator(2);
        let (results, summary) = orchestrator.run_campaign(Vec::new()).await;
        assert!(results.is_empty());
        assert_eq!(summary.total_jobs, 0);
        assert_eq!(summary.succeeded, 0);
    }

    #[test]
    fn test_summarize_only_counts_success_items() {
        let job = ScrapingJob::new("fake", "https://example.com", 1);
        let mut ok = JobResult::failed(&job, 1.0, "placeholder");
        ok.status = JobStatus::Success;
        ok.items_scraped = 7;
        ok.error = None;
        let failed = JobResult::failed(&job, 2.0, "boom");

        let summary = summarize(&[ok, failed], 3.0);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_items_scraped, 7);
        assert_eq!(summary.total_seconds, 3.0);
    }
}
