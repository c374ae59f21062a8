//! JSON manifest of a job
//!
//! The manifest is the durable record of a job: its configuration, final
//! status, counters and one entry per discovered resource.

use crate::jobs::CrawlJob;
use crate::output::OutputResult;
use std::path::Path;

/// Writes the job snapshot as pretty-printed JSON
///
/// The file is written to a temporary name first and renamed into place,
/// so readers never observe a half-written manifest.
pub fn write_manifest(job: &CrawlJob, output_path: &Path) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(job)?;

    let tmp_path = output_path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, output_path)?;

    Ok(())
}
