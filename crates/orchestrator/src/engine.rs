//! Engine execution: in-process native engines and external subprocesses.

use crate::decode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rabbithole::RabbitholeCrawler;
use serde_json::Value;
use shared::collaborators::parse_term_list;
use shared::config::CrawlerConfig;
use shared::ScrapingJob;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Items produced by one engine run
pub type EngineOutput = Vec<Value>;

/// A runnable scraper engine. The orchestrator only sees this trait, so
/// campaigns are testable with in-memory fakes.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &str;

    /// Execute one job to completion, returning the decoded items.
    async fn run(&self, job: &ScrapingJob) -> Result<EngineOutput>;
}

/// The native in-process engine, wrapping the rabbithole crawler.
pub struct RabbitholeEngine {
    config: CrawlerConfig,
}

impl RabbitholeEngine {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Engine for RabbitholeEngine {
    fn name(&self) -> &str {
        "rabbithole"
    }

    async fn run(&self, job: &ScrapingJob) -> Result<EngineOutput> {
        let mut config = self.config.clone();

        // Per-job overrides folded in by the orchestrator
        if let Some(delay) = job.config.get("delay_seconds").and_then(|v| v.as_f64()) {
            config.politeness_delay_ms = (delay * 1000.0) as u64;
        }
        if let Some(depth) = job.config.get("max_depth").and_then(|v| v.as_u64()) {
            config.max_depth = depth as u32;
        }

        let raw_keywords = job
            .config
            .get("keywords")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let seeds: Vec<String> = job
            .config
            .get("seed_keywords")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        let keywords = parse_term_list(raw_keywords, &seeds);
        if keywords.is_empty() {
            anyhow::bail!("Rabbithole job has no keywords");
        }

        let crawler = RabbitholeCrawler::new(config)?;
        let summary = crawler.crawl(&job.target_url, keywords).await?;

        let items = summary
            .nodes
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to serialize knowledge nodes")?;
        Ok(items)
    }
}

/// An engine run as a subprocess.
///
/// Invocation contract: `executable <platform> <url> <volume> [secondary]`.
/// Output is decoded from stdout or the results directory; exit status
/// zero with nothing decodable is still a failure.
pub struct ExternalEngine {
    name: String,
    executable: String,
    timeout: Duration,
    results_dir: PathBuf,
}

impl ExternalEngine {
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<String>,
        timeout: Duration,
        results_dir: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            timeout,
            results_dir,
        }
    }
}

#[async_trait]
impl Engine for ExternalEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, job: &ScrapingJob) -> Result<EngineOutput> {
        let platform = job.platform.clone().unwrap_or_else(|| "generic".to_string());
        let volume = job
            .config
            .get("volume")
            .and_then(|v| v.as_str())
            .unwrap_or("standard")
            .to_string();

        let mut command = tokio::process::Command::new(&self.executable);
        command
            .arg(&platform)
            .arg(&job.target_url)
            .arg(&volume)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(secondary) = job.config.get("secondary").and_then(|v| v.as_str()) {
            command.arg(secondary);
        }

        info!(
            engine = %self.name,
            executable = %self.executable,
            url = %job.target_url,
            platform = %platform,
            "Spawning external engine"
        );

        let child = command
            .spawn()
            .with_context(|| format!("Failed to spawn engine {}", self.executable))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Engine process failed")?,
            Err(_) => {
                // kill_on_drop reaps the child when the future is dropped
                anyhow::bail!(
                    "Engine {} timed out after {}s",
                    self.name,
                    self.timeout.as_secs()
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.chars().take(500).collect();
            warn!(engine = %self.name, status = %output.status, "Engine exited non-zero");
            anyhow::bail!("Engine {} failed ({}): {}", self.name, output.status, excerpt);
        }

        debug!(
            engine = %self.name,
            stdout_bytes = stdout.len(),
            "Engine exited cleanly, decoding output"
        );

        let items = decode::decode_output(&stdout, &self.results_dir)
            .with_context(|| format!("Engine {} produced no usable results", self.name))?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job(url: &str) -> ScrapingJob {
        ScrapingJob::new("external", url, 1)
    }

    #[cfg(unix)]
    fn script(dir: &TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("engine.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_engine_decodes_stdout() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, r#"echo '[{"url": "https://example.com/a"}]'"#);
        let engine = ExternalEngine::new(
            "test",
            exe,
            Duration::from_secs(10),
            dir.path().to_path_buf(),
        );

        let items = engine.run(&job("https://example.com")).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["url"], "https://example.com/a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_engine_nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "echo boom >&2; exit 3");
        let engine = ExternalEngine::new(
            "test",
            exe,
            Duration::from_secs(10),
            dir.path().to_path_buf(),
        );

        let err = engine.run(&job("https://example.com")).await.unwrap_err();
        assert!(err.to_string().contains("failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_engine_clean_exit_without_output_fails() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "exit 0");
        let engine = ExternalEngine::new(
            "test",
            exe,
            Duration::from_secs(10),
            dir.path().to_path_buf(),
        );

        assert!(engine.run(&job("https://example.com")).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_engine_timeout() {
        let dir = TempDir::new().unwrap();
        let exe = script(&dir, "sleep 30");
        let engine = ExternalEngine::new(
            "test",
            exe,
            Duration::from_millis(100),
            dir.path().to_path_buf(),
        );

        let err = engine.run(&job("https://example.com")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_rabbithole_engine_requires_keywords() {
        let engine = RabbitholeEngine::new(CrawlerConfig::default());
        let err = engine.run(&job("https://example.com")).await.unwrap_err();
        assert!(err.to_string().contains("keywords"));
    }
}
