//! Shared state of one crawl job

use crate::config::JobConfig;
use crate::state::{JobStatus, Outcome, ResourceKind, ResourceRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

/// Unique job identifier
pub type JobId = Uuid;

/// Running totals of a job
///
/// At every terminal status `discovered == downloaded + failed + skipped_duplicate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub discovered: u64,
    pub downloaded: u64,
    pub failed: u64,
    pub skipped_duplicate: u64,
    pub bytes_written: u64,
}

impl JobCounters {
    /// Resources with a recorded outcome
    pub fn settled(&self) -> u64 {
        self.downloaded + self.failed + self.skipped_duplicate
    }

    /// True once every discovered resource has an outcome
    pub fn is_balanced(&self) -> bool {
        self.discovered == self.settled()
    }

    fn apply(&mut self, record: &ResourceRecord) {
        match record.outcome {
            Outcome::Success => {
                self.downloaded += 1;
                self.bytes_written += record.size;
            }
            Outcome::Failed => self.failed += 1,
            Outcome::SkippedDuplicate => self.skipped_duplicate += 1,
        }
    }
}

/// Point-in-time progress, broadcast on every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub status: JobStatus,
    #[serde(flatten)]
    pub counters: JobCounters,
}

/// Read-only snapshot of a job
#[derive(Debug, Clone, Serialize)]
pub struct CrawlJob {
    pub id: JobId,
    pub seed_url: String,
    pub config: JobConfig,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counters: JobCounters,

    /// Job-level failure reason (seed unreachable, save root unusable)
    pub error: Option<String>,

    pub records: Vec<ResourceRecord>,
}

impl CrawlJob {
    /// Records grouped by kind, kinds in a stable order
    pub fn records_by_kind(&self) -> BTreeMap<ResourceKind, Vec<&ResourceRecord>> {
        let mut grouped: BTreeMap<ResourceKind, Vec<&ResourceRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.kind).or_default().push(record);
        }
        grouped
    }

    /// Failed records only
    pub fn failures(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome == Outcome::Failed)
    }
}

struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    counters: JobCounters,
    error: Option<String>,
    records: Vec<ResourceRecord>,
}

/// Live handle to a job, shared by the engine and the job's workers
///
/// Counters and records are updated together under one lock, so any
/// snapshot is internally consistent. Once the status is terminal nothing
/// changes any more.
pub struct JobHandle {
    id: JobId,
    seed_url: Url,
    config: JobConfig,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
    cancel: CancellationToken,
    progress: watch::Sender<JobProgress>,
}

impl JobHandle {
    pub fn new(seed_url: Url, config: JobConfig) -> Self {
        let (progress, _) = watch::channel(JobProgress {
            status: JobStatus::Pending,
            counters: JobCounters::default(),
        });

        Self {
            id: Uuid::new_v4(),
            seed_url,
            config,
            created_at: Utc::now(),
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                started_at: None,
                completed_at: None,
                counters: JobCounters::default(),
                error: None,
                records: Vec::new(),
            }),
            cancel: CancellationToken::new(),
            progress,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn seed_url(&self) -> &Url {
        &self.seed_url
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Token observed by every wait point of the job
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Requests cancellation; a no-op on a finished job
    ///
    /// # Returns
    ///
    /// `true` if the job was still active when the request arrived
    pub fn cancel(&self) -> bool {
        let active = self.status().is_active();
        if active {
            tracing::info!(job_id = %self.id, "Cancellation requested");
            self.cancel.cancel();
        }
        active
    }

    /// Moves the job from `Pending` to `Running`
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if !state.status.can_transition_to(JobStatus::Running) {
            return false;
        }
        state.status = JobStatus::Running;
        state.started_at = Some(Utc::now());
        self.publish(&state);
        true
    }

    /// Adds newly discovered resource references to the total
    pub fn record_discovered(&self, count: u64) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return;
        }
        state.counters.discovered += count;
        self.publish(&state);
    }

    /// Stores the outcome of one resource
    pub fn record(&self, record: ResourceRecord) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            tracing::warn!(job_id = %self.id, "Ignoring record for {} on finished job", record.url);
            return;
        }
        state.counters.apply(&record);
        state.records.push(record);
        self.publish(&state);
    }

    /// Remembers a job-fatal error; the job ends `Failed` when it finishes
    pub fn set_error(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        if state.error.is_none() {
            state.error = Some(message.into());
        }
    }

    /// Moves the job to its terminal status
    ///
    /// Cancellation wins over a recorded error, which wins over success.
    pub fn finish(&self) -> JobStatus {
        let final_snapshot = self.final_snapshot();
        self.finish_with(&final_snapshot)
    }

    /// Snapshot carrying the status and completion time the job will end with
    ///
    /// Nothing is published, so reports can be written from the snapshot
    /// before anyone waiting on the job is woken by [`JobHandle::finish_with`].
    pub fn final_snapshot(&self) -> CrawlJob {
        let mut snapshot = self.snapshot();
        if !snapshot.status.is_terminal() {
            snapshot.status = if self.cancel.is_cancelled() {
                JobStatus::Cancelled
            } else if snapshot.error.is_some() {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
            snapshot.completed_at = Some(Utc::now());
        }
        snapshot
    }

    /// Publishes the terminal status of a snapshot from [`JobHandle::final_snapshot`]
    pub fn finish_with(&self, final_snapshot: &CrawlJob) -> JobStatus {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return state.status;
        }

        state.status = final_snapshot.status;
        state.completed_at = final_snapshot.completed_at.or_else(|| Some(Utc::now()));
        self.publish(&state);
        state.status
    }

    pub fn progress(&self) -> JobProgress {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.progress.subscribe()
    }

    pub fn snapshot(&self) -> CrawlJob {
        let state = self.state.lock();
        CrawlJob {
            id: self.id,
            seed_url: self.seed_url.to_string(),
            config: self.config.clone(),
            status: state.status,
            created_at: self.created_at,
            started_at: state.started_at,
            completed_at: state.completed_at,
            counters: state.counters,
            error: state.error.clone(),
            records: state.records.clone(),
        }
    }

    fn publish(&self, state: &JobState) {
        self.progress.send_replace(JobProgress {
            status: state.status,
            counters: state.counters,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HarvestError;

    fn handle() -> JobHandle {
        JobHandle::new(
            Url::parse("https://example.com/").unwrap(),
            JobConfig::default(),
        )
    }

    fn success(url: &str, size: u64) -> ResourceRecord {
        ResourceRecord {
            url: url.to_string(),
            kind: ResourceKind::Image,
            path: Some("image/x.png".into()),
            size,
            checksum: Some("00".to_string()),
            outcome: Outcome::Success,
            error: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_lifecycle_completed() {
        let job = handle();
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.start());
        assert_eq!(job.status(), JobStatus::Running);

        job.record_discovered(2);
        job.record(success("https://example.com/a.png", 10));
        job.record(ResourceRecord::skipped_duplicate(
            "https://example.com/a.png",
            ResourceKind::Image,
        ));

        assert_eq!(job.finish(), JobStatus::Completed);
        let snap = job.snapshot();
        assert!(snap.counters.is_balanced());
        assert_eq!(snap.counters.bytes_written, 10);
        assert!(snap.completed_at.is_some());
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let job = handle();
        job.start();
        job.finish();

        job.record_discovered(5);
        job.record(success("https://example.com/late.png", 1));

        let snap = job.snapshot();
        assert_eq!(snap.counters, JobCounters::default());
        assert!(snap.records.is_empty());
        assert!(!job.start());
    }

    #[test]
    fn test_cancel_wins_over_error() {
        let job = handle();
        job.start();
        job.set_error("seed unreachable");
        assert!(job.cancel());
        assert_eq!(job.finish(), JobStatus::Cancelled);
        // a second cancel on a finished job is a no-op
        assert!(!job.cancel());
    }

    #[test]
    fn test_fail_before_start() {
        let job = handle();
        job.set_error("save root not writable");
        assert_eq!(job.finish(), JobStatus::Failed);
        assert_eq!(job.snapshot().error.as_deref(), Some("save root not writable"));
    }

    #[test]
    fn test_progress_broadcast() {
        let job = handle();
        let rx = job.subscribe();
        job.start();
        job.record_discovered(1);
        let err = HarvestError::Timeout {
            url: "https://example.com/slow.js".to_string(),
        };
        job.record(ResourceRecord::failed(
            "https://example.com/slow.js",
            ResourceKind::Script,
            None,
            3,
            &err,
        ));

        let progress = *rx.borrow();
        assert_eq!(progress.status, JobStatus::Running);
        assert_eq!(progress.counters.discovered, 1);
        assert_eq!(progress.counters.failed, 1);
        assert_eq!(job.progress(), progress);
    }

    #[test]
    fn test_records_by_kind_and_failures() {
        let job = handle();
        job.start();
        job.record_discovered(2);
        job.record(success("https://example.com/a.png", 3));
        let err = HarvestError::HttpClientError {
            url: "https://example.com/b.js".to_string(),
            status: 404,
        };
        job.record(ResourceRecord::failed(
            "https://example.com/b.js",
            ResourceKind::Script,
            None,
            1,
            &err,
        ));

        let snap = job.snapshot();
        let grouped = snap.records_by_kind();
        assert_eq!(grouped[&ResourceKind::Image].len(), 1);
        assert_eq!(grouped[&ResourceKind::Script].len(), 1);
        assert_eq!(snap.failures().count(), 1);
    }
}
