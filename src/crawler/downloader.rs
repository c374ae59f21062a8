//! Download manager: fetch one resource and persist it under the job directory

use crate::crawler::fetcher::Fetcher;
use crate::state::{Outcome, ResourceKind, ResourceRecord};
use crate::storage::{PathAllocator, ScopedFile};
use crate::HarvestError;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Saves resources to `<job_dir>/<kind>/<file>`
pub struct DownloadManager {
    fetcher: Arc<Fetcher>,
    paths: PathAllocator,
}

impl DownloadManager {
    pub fn new(fetcher: Arc<Fetcher>, job_dir: PathBuf) -> Self {
        Self {
            fetcher,
            paths: PathAllocator::new(job_dir),
        }
    }

    /// Downloads a resource and returns its record
    ///
    /// Never returns an error: every failure is folded into a `Failed`
    /// record so the job's counters always balance. The body is streamed
    /// into a [`ScopedFile`], so a failed or cancelled transfer leaves no
    /// partial file behind.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute resource URL
    /// * `kind` - Decides the subdirectory
    /// * `attempts` - Attempt counter, updated as the fetcher retries
    pub async fn download(&self, url: &Url, kind: ResourceKind, attempts: &mut u32) -> ResourceRecord {
        let relative = match self.paths.assign(url, kind) {
            Ok(path) => path,
            Err(e) => {
                let err = HarvestError::from(e);
                return ResourceRecord::failed(url.as_str(), kind, None, *attempts, &err);
            }
        };

        let full_path = match self.paths.resolve(&relative) {
            Ok(path) => path,
            Err(e) => {
                let err = HarvestError::from(e);
                return ResourceRecord::failed(url.as_str(), kind, None, *attempts, &err);
            }
        };

        let mut file = ScopedFile::new(full_path);

        let result = match self.fetcher.fetch_into(url, &mut file, attempts).await {
            Ok(_meta) => file.commit().await.map_err(HarvestError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(written) => {
                tracing::debug!(
                    url = %url,
                    path = %relative.display(),
                    bytes = written.size,
                    "Saved resource"
                );
                ResourceRecord {
                    url: url.to_string(),
                    kind,
                    path: Some(relative),
                    size: written.size,
                    checksum: Some(written.checksum),
                    outcome: Outcome::Success,
                    error: None,
                    attempts: *attempts,
                }
            }
            Err(e) => {
                if !matches!(e, HarvestError::Cancelled) {
                    tracing::warn!(url = %url, attempts = *attempts, "Download failed: {}", e);
                }
                ResourceRecord::failed(url.as_str(), kind, None, *attempts, &e)
            }
        }
    }
}
