//! Output module for job reports
//!
//! This module handles:
//! - Writing the JSON manifest of a finished job
//! - Generating markdown summaries of job results
//! - Computing and printing job statistics

mod manifest;
mod markdown;
pub mod stats;

pub use manifest::write_manifest;
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_statistics, JobStatistics};

use crate::config::OutputConfig;
use crate::jobs::CrawlJob;
use std::path::Path;
use thiserror::Error;

/// File name of the manifest inside the job directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the markdown summary inside the job directory
pub const SUMMARY_FILE: &str = "summary.md";

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes every enabled report for a job into its directory
///
/// # Arguments
///
/// * `job` - Final snapshot of the job
/// * `job_dir` - The job's directory under the save root
/// * `config` - Which reports are enabled
pub fn write_job_outputs(job: &CrawlJob, job_dir: &Path, config: &OutputConfig) -> OutputResult<()> {
    if config.write_manifest {
        write_manifest(job, &job_dir.join(MANIFEST_FILE))?;
    }

    if config.write_summary {
        generate_markdown_summary(job, &job_dir.join(SUMMARY_FILE))?;
    }

    Ok(())
}
