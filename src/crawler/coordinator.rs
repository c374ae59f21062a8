//! Crawler coordinator - runs one job from seed page to terminal status
//!
//! This module contains the worker pool that drives a job, including:
//! - Preparing the job directory and the shared fetch machinery
//! - Fetching the seed page and fanning its resources out as tasks
//! - Claiming URLs in the dedup registry and recording duplicates
//! - Draining the task queue with a bounded number of workers
//! - Settling tasks that were still queued when the job was cancelled
//! - Writing the job's manifest and summary

use crate::config::{OutputConfig, UserAgentConfig};
use crate::crawler::dedup::DedupRegistry;
use crate::crawler::downloader::DownloadManager;
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::parser::{extract_resources, DiscoveredResource};
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::scheduler::{Task, TaskKind, TaskQueue};
use crate::jobs::JobHandle;
use crate::output::write_job_outputs;
use crate::state::{ResourceKind, ResourceRecord};
use crate::storage::{job_directory, prepare_job_directory};
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Everything the workers of one job share
pub struct Coordinator {
    job: Arc<JobHandle>,
    queue: TaskQueue,
    registry: DedupRegistry,
    fetcher: Arc<Fetcher>,
    downloads: DownloadManager,
}

impl Coordinator {
    /// Builds the shared machinery for a job
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The save root is unusable or the HTTP client
    ///   could not be built; the job cannot start
    pub async fn new(job: Arc<JobHandle>, user_agent: &UserAgentConfig) -> Result<Self, HarvestError> {
        let config = job.config();
        let job_dir = job_directory(&config.save_root, &job.id().to_string());
        prepare_job_directory(&job_dir).await?;

        let client = build_http_client(user_agent, config.timeout())?;
        let limiter = Arc::new(RateLimiter::from_config(config));
        let fetcher = Arc::new(Fetcher::new(client, limiter, config, job.cancel_token()));
        let downloads = DownloadManager::new(fetcher.clone(), job_dir);

        Ok(Self {
            job,
            queue: TaskQueue::new(),
            registry: DedupRegistry::new(),
            fetcher,
            downloads,
        })
    }

    /// Runs the job to completion and returns once every worker has exited
    pub async fn run(self: Arc<Self>) {
        let job_id = self.job.id();
        let workers = self.job.config().max_concurrent.max(1);

        // a cancel that arrived earlier is settled when a worker takes the seed task
        self.job.start();

        tracing::info!(
            job_id = %job_id,
            seed = %self.job.seed_url(),
            workers,
            "Starting job"
        );

        self.queue.push(Task::seed(job_id, self.job.seed_url().clone()));

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let coordinator = self.clone();
            pool.spawn(async move { coordinator.worker_loop(worker_id).await });
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(job_id = %job_id, "Worker ended abnormally: {}", e);
            }
        }
    }

    /// Takes tasks until the queue runs dry
    async fn worker_loop(&self, worker_id: u32) {
        tracing::trace!(job_id = %self.job.id(), worker_id, "Worker started");

        while let Some(mut task) = self.queue.next().await {
            let follow_ups = if self.job.is_cancelled() {
                self.abandon(&task);
                Vec::new()
            } else {
                match task.kind {
                    TaskKind::SeedPage => self.process_seed(&mut task).await,
                    TaskKind::Resource(kind) => {
                        self.process_resource(&mut task, kind).await;
                        Vec::new()
                    }
                }
            };
            self.queue.complete(follow_ups);
        }

        tracing::trace!(job_id = %self.job.id(), worker_id, "Worker exiting");
    }

    /// Fetches the seed page and turns its resources into tasks
    async fn process_seed(&self, task: &mut Task) -> Vec<Task> {
        let page = match self.fetcher.fetch(&task.url, &mut task.attempts).await {
            Ok(page) => page,
            Err(HarvestError::Cancelled) => return Vec::new(),
            Err(e) => {
                tracing::error!(job_id = %self.job.id(), "Failed to fetch seed page {}: {}", task.url, e);
                self.job
                    .set_error(format!("Failed to fetch seed page {}: {}", task.url, e));
                return Vec::new();
            }
        };

        if let Some(content_type) = &page.meta.content_type {
            if !content_type.contains("html") {
                tracing::warn!(
                    job_id = %self.job.id(),
                    "Seed page is {} rather than HTML; extracting anyway",
                    content_type
                );
            }
        }

        let extracted = extract_resources(&page.body, &page.meta.final_url);
        tracing::info!(
            job_id = %self.job.id(),
            "Seed page yielded {} resources ({} repeated references)",
            extracted.resources.len(),
            extracted.duplicates.len()
        );

        self.job.record_discovered(extracted.discovered() as u64);

        let mut tasks = Vec::with_capacity(extracted.resources.len());
        for resource in extracted.resources {
            if self.registry.try_claim(&resource.url) {
                tasks.push(Task::resource(task.job_id, resource));
            } else {
                self.record_duplicate(&resource);
            }
        }
        for duplicate in &extracted.duplicates {
            self.record_duplicate(duplicate);
        }

        tasks
    }

    async fn process_resource(&self, task: &mut Task, kind: ResourceKind) {
        let record = self
            .downloads
            .download(&task.url, kind, &mut task.attempts)
            .await;
        self.job.record(record);
    }

    fn record_duplicate(&self, resource: &DiscoveredResource) {
        tracing::debug!(job_id = %self.job.id(), "Skipping duplicate {}", resource.url);
        self.job.record(ResourceRecord::skipped_duplicate(
            resource.url.as_str(),
            resource.kind,
        ));
    }

    /// Settles a task that was still queued when cancellation arrived
    fn abandon(&self, task: &Task) {
        if let TaskKind::Resource(kind) = task.kind {
            self.job.record(ResourceRecord::failed(
                task.url.as_str(),
                kind,
                None,
                task.attempts,
                &HarvestError::Cancelled,
            ));
        }
    }
}

/// Runs a submitted job end to end
///
/// 1. Prepare the job directory (failure → job `Failed`)
/// 2. Build client, limiter and fetcher
/// 3. Run the worker pool until the queue runs dry
/// 4. Decide the terminal status
/// 5. Write manifest and summary, if enabled
/// 6. Publish the terminal status
///
/// # Arguments
///
/// * `job` - The job to run; its status is updated in place
/// * `user_agent` - Identification sent with every request
/// * `output` - Which job reports to write
pub async fn run_job(job: Arc<JobHandle>, user_agent: UserAgentConfig, output: OutputConfig) {
    let job_dir = job_directory(&job.config().save_root, &job.id().to_string());

    match Coordinator::new(job.clone(), &user_agent).await {
        Ok(coordinator) => Arc::new(coordinator).run().await,
        Err(e) => {
            tracing::error!(job_id = %job.id(), "Cannot start job: {}", e);
            job.set_error(format!("Cannot start job: {}", e));
        }
    }

    // Reports are written before the terminal status is published, so a
    // caller woken by it finds them in place
    let snapshot = job.final_snapshot();

    tracing::info!(
        job_id = %job.id(),
        "Job {}: {} discovered, {} downloaded, {} failed, {} duplicates",
        snapshot.status,
        snapshot.counters.discovered,
        snapshot.counters.downloaded,
        snapshot.counters.failed,
        snapshot.counters.skipped_duplicate
    );

    if job_dir.is_dir() {
        if let Err(e) = write_job_outputs(&snapshot, &job_dir, &output) {
            tracing::warn!(job_id = %job.id(), "Failed to write job reports: {}", e);
        }
    }

    job.finish_with(&snapshot);
}
