//! Markdown summary generation
//!
//! This module generates a human-readable `summary.md` for a job, including
//! counters, a per-kind breakdown and the list of failed resources.

use crate::jobs::CrawlJob;
use crate::output::stats::{format_bytes, JobStatistics};
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failures listed individually before the table is cut short
const MAX_LISTED_FAILURES: usize = 50;

/// Generates a markdown summary of a job
///
/// # Arguments
///
/// * `job` - The job snapshot
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(job: &CrawlJob, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(job);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a job snapshot as markdown
pub fn format_markdown_summary(job: &CrawlJob) -> String {
    let stats = JobStatistics::from_job(job);
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Job Summary\n\n");

    // Job metadata
    md.push_str("## Job Information\n\n");
    md.push_str(&format!("- **Job ID**: {}\n", job.id));
    md.push_str(&format!("- **Seed URL**: {}\n", job.seed_url));
    md.push_str(&format!("- **Status**: {}\n", job.status));
    md.push_str(&format!("- **Created**: {}\n", job.created_at.to_rfc3339()));
    if let Some(finished) = job.completed_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = stats.duration_seconds {
        md.push_str(&format!("- **Duration**: {:.1} seconds\n", duration));
    }
    if let Some(error) = &job.error {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push_str(&format!(
        "- **Limits**: {} workers, {} requests per {} ms, {} ms timeout\n\n",
        job.config.max_concurrent,
        job.config.rate_limit_per_interval,
        job.config.rate_interval_ms,
        job.config.timeout_ms
    ));

    // Totals
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Discovered**: {}\n", stats.discovered));
    md.push_str(&format!("- **Downloaded**: {}\n", stats.downloaded));
    md.push_str(&format!("- **Failed**: {}\n", stats.failed));
    md.push_str(&format!(
        "- **Skipped Duplicates**: {}\n",
        stats.skipped_duplicate
    ));
    md.push_str(&format!(
        "- **Bytes Written**: {}\n",
        format_bytes(stats.bytes_written)
    ));
    md.push_str(&format!("- **Requests Made**: {}\n", stats.total_attempts));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    // Per-kind breakdown
    if !stats.by_kind.is_empty() {
        md.push_str("## Resources by Kind\n\n");
        md.push_str("| Kind | Downloaded | Failed | Duplicates | Size |\n");
        md.push_str("|------|------------|--------|------------|------|\n");

        for (kind, kind_stats) in &stats.by_kind {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                kind,
                kind_stats.downloaded,
                kind_stats.failed,
                kind_stats.skipped_duplicate,
                format_bytes(kind_stats.bytes)
            ));
        }
        md.push('\n');
    }

    // Error summary
    if !stats.errors.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");

        for (kind, count) in &stats.errors {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    // Individual failures
    let failures: Vec<_> = job.failures().collect();
    if !failures.is_empty() {
        md.push_str("## Failed Resources\n\n");
        md.push_str("| URL | Kind | Error | Attempts |\n");
        md.push_str("|-----|------|-------|----------|\n");

        for record in failures.iter().take(MAX_LISTED_FAILURES) {
            let error = record
                .error
                .as_ref()
                .map(|e| e.kind.to_string())
                .unwrap_or_default();
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                record.url, record.kind, error, record.attempts
            ));
        }
        if failures.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                failures.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Generated by Sumi-Harvest v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobConfig;
    use crate::jobs::JobHandle;
    use crate::state::{ResourceKind, ResourceRecord};
    use crate::HarvestError;
    use url::Url;

    fn finished_job() -> CrawlJob {
        let handle = JobHandle::new(
            Url::parse("https://example.com/gallery").unwrap(),
            JobConfig::default(),
        );
        handle.start();
        handle.record_discovered(2);
        handle.record(ResourceRecord::skipped_duplicate(
            "https://example.com/a.png",
            ResourceKind::Image,
        ));
        handle.record(ResourceRecord::failed(
            "https://example.com/app.js",
            ResourceKind::Script,
            None,
            3,
            &HarvestError::Timeout {
                url: "https://example.com/app.js".to_string(),
            },
        ));
        handle.finish();
        handle.snapshot()
    }

    #[test]
    fn test_format_markdown_summary() {
        let job = finished_job();
        let md = format_markdown_summary(&job);

        assert!(md.contains("# Sumi-Harvest Job Summary"));
        assert!(md.contains(&format!("- **Job ID**: {}", job.id)));
        assert!(md.contains("- **Status**: completed"));
        assert!(md.contains("- **Discovered**: 2"));
        assert!(md.contains("| script | 0 | 1 | 0 | 0 B |"));
        assert!(md.contains("| Timeout | 1 |"));
        assert!(md.contains("| https://example.com/app.js | script | Timeout | 3 |"));
    }

    #[test]
    fn test_generate_markdown_summary_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&finished_job(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Sumi-Harvest Job Summary"));
    }
}
