//! Statistics derived from a job snapshot
//!
//! This module provides per-kind and per-error breakdowns of a finished (or
//! running) job and prints them for the command line.

use crate::jobs::CrawlJob;
use crate::state::{ErrorKind, Outcome, ResourceKind};
use std::collections::BTreeMap;

/// Outcome counts for one resource kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStatistics {
    pub downloaded: u64,
    pub failed: u64,
    pub skipped_duplicate: u64,
    pub bytes: u64,
}

impl KindStatistics {
    pub fn total(&self) -> u64 {
        self.downloaded + self.failed + self.skipped_duplicate
    }
}

/// Job statistics summary
#[derive(Debug, Clone)]
pub struct JobStatistics {
    /// Resource references found on the seed page
    pub discovered: u64,

    pub downloaded: u64,
    pub failed: u64,
    pub skipped_duplicate: u64,
    pub bytes_written: u64,

    /// Breakdown by resource kind
    pub by_kind: BTreeMap<ResourceKind, KindStatistics>,

    /// Failed resources per error kind
    pub errors: BTreeMap<String, u64>,

    /// Attempts spent over all records, retries included
    pub total_attempts: u64,

    /// Wall-clock duration, once the job has started and finished
    pub duration_seconds: Option<f64>,
}

impl JobStatistics {
    /// Computes statistics from a job snapshot
    pub fn from_job(job: &CrawlJob) -> Self {
        let mut by_kind: BTreeMap<ResourceKind, KindStatistics> = BTreeMap::new();
        let mut errors: BTreeMap<String, u64> = BTreeMap::new();
        let mut total_attempts = 0u64;

        for record in &job.records {
            let stats = by_kind.entry(record.kind).or_default();
            match record.outcome {
                Outcome::Success => {
                    stats.downloaded += 1;
                    stats.bytes += record.size;
                }
                Outcome::Failed => {
                    stats.failed += 1;
                    let kind = record
                        .error_kind()
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "Unknown".to_string());
                    *errors.entry(kind).or_insert(0) += 1;
                }
                Outcome::SkippedDuplicate => stats.skipped_duplicate += 1,
            }
            total_attempts += u64::from(record.attempts);
        }

        let duration_seconds = match (job.started_at, job.completed_at) {
            (Some(started), Some(finished)) => {
                Some((finished - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        };

        Self {
            discovered: job.counters.discovered,
            downloaded: job.counters.downloaded,
            failed: job.counters.failed,
            skipped_duplicate: job.counters.skipped_duplicate,
            bytes_written: job.counters.bytes_written,
            by_kind,
            errors,
            total_attempts,
            duration_seconds,
        }
    }

    /// Share of unique resources that were saved, in percent
    pub fn success_rate(&self) -> f64 {
        let attempted = self.downloaded + self.failed;
        if attempted == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / attempted as f64) * 100.0
    }

    /// Count of failures of one error kind
    pub fn errors_of(&self, kind: ErrorKind) -> u64 {
        self.errors.get(&kind.to_string()).copied().unwrap_or(0)
    }
}

/// Formats a byte count for humans
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `job` - The job the statistics belong to
/// * `stats` - The statistics to display
pub fn print_statistics(job: &CrawlJob, stats: &JobStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Job {} ({})", job.id, job.status);
    println!("  Seed: {}", job.seed_url);
    if let Some(duration) = stats.duration_seconds {
        println!("  Duration: {:.1}s", duration);
    }
    if let Some(error) = &job.error {
        println!("  Error: {}", error);
    }
    println!();

    println!("Overview:");
    println!("  Discovered: {}", stats.discovered);
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Failed: {}", stats.failed);
    println!("  Duplicates skipped: {}", stats.skipped_duplicate);
    println!("  Written: {}", format_bytes(stats.bytes_written));
    println!("  Requests: {}", stats.total_attempts);
    println!();

    if !stats.by_kind.is_empty() {
        println!("By Kind:");
        for (kind, kind_stats) in &stats.by_kind {
            println!(
                "  {}: {} saved, {} failed, {} duplicates ({})",
                kind,
                kind_stats.downloaded,
                kind_stats.failed,
                kind_stats.skipped_duplicate,
                format_bytes(kind_stats.bytes)
            );
        }
        println!();
    }

    if !stats.errors.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.errors.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} resources saved)",
        stats.success_rate(),
        stats.downloaded,
        stats.downloaded + stats.failed
    );
}
