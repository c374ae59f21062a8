//! Job orchestration for Sumi-Harvest
//!
//! The [`Engine`] accepts crawl jobs, runs each one on the tokio runtime and
//! answers status, progress and cancellation requests by job id. Jobs stay
//! queryable after they finish.

mod job;

pub use job::{CrawlJob, JobCounters, JobHandle, JobId, JobProgress};

use crate::config::{validate_job_config, Config, JobConfig, OutputConfig, UserAgentConfig};
use crate::crawler::run_job;
use crate::url::validate_seed_url;
use crate::{HarvestError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Accepts and tracks crawl jobs
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::{Config, Engine, JobConfig};
///
/// # async fn demo() -> sumi_harvest::Result<()> {
/// let engine = Engine::new(&Config::default());
/// let id = engine.submit("https://example.com/", JobConfig::default())?;
/// let job = engine.wait(id).await?;
/// println!("{}: {} files", job.status, job.counters.downloaded);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    jobs: DashMap<JobId, Arc<JobHandle>>,
    user_agent: UserAgentConfig,
    output: OutputConfig,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self {
            jobs: DashMap::new(),
            user_agent: config.user_agent.clone(),
            output: config.output.clone(),
        }
    }

    /// Starts a crawl of `seed_url`
    ///
    /// Returns as soon as the job is registered; the crawl itself runs in a
    /// background task. Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(JobId)` - The job was accepted and is `Pending` or later
    /// * `Err(HarvestError::InvalidInput)` - Bad seed URL or job configuration
    pub fn submit(&self, seed_url: &str, config: JobConfig) -> Result<JobId> {
        let url = validate_seed_url(seed_url)
            .map_err(|e| HarvestError::InvalidInput(format!("seed URL '{}': {}", seed_url, e)))?;
        validate_job_config(&config).map_err(|e| HarvestError::InvalidInput(e.to_string()))?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HarvestError::InvalidInput(format!("no async runtime: {}", e)))?;

        let job = Arc::new(JobHandle::new(url, config));
        let id = job.id();
        self.jobs.insert(id, job.clone());

        tracing::info!(job_id = %id, seed = %job.seed_url(), "Job submitted");
        runtime.spawn(run_job(job, self.user_agent.clone(), self.output.clone()));

        Ok(id)
    }

    /// Returns a snapshot of a job
    pub fn status(&self, id: JobId) -> Result<CrawlJob> {
        Ok(self.handle(id)?.snapshot())
    }

    /// Requests cancellation of a job
    ///
    /// Cancelling a job that already finished is accepted and changes
    /// nothing.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        self.handle(id)?.cancel();
        Ok(())
    }

    /// Subscribes to progress updates of a job
    pub fn subscribe(&self, id: JobId) -> Result<watch::Receiver<JobProgress>> {
        Ok(self.handle(id)?.subscribe())
    }

    /// Waits until a job reaches a terminal status and returns its snapshot
    pub async fn wait(&self, id: JobId) -> Result<CrawlJob> {
        let handle = self.handle(id)?;
        let mut progress = handle.subscribe();

        if progress.wait_for(|p| p.status.is_terminal()).await.is_err() {
            tracing::debug!(job_id = %id, "Progress channel closed while waiting");
        }

        Ok(handle.snapshot())
    }

    /// Ids of all known jobs
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|entry| *entry.key()).collect()
    }

    /// Drops a finished job from the registry
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlJob)` - Final snapshot of the removed job
    /// * `Err(HarvestError::InvalidInput)` - The job is still active
    /// * `Err(HarvestError::NotFound)` - Unknown id
    pub fn forget(&self, id: JobId) -> Result<CrawlJob> {
        let snapshot = self.status(id)?;
        if snapshot.status.is_active() {
            return Err(HarvestError::InvalidInput(format!(
                "job {} is still {}",
                id, snapshot.status
            )));
        }
        self.jobs.remove(&id);
        Ok(snapshot)
    }

    fn handle(&self, id: JobId) -> Result<Arc<JobHandle>> {
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(HarvestError::NotFound(id))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
