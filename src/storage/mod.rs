//! Storage module for writing downloaded resources to disk
//!
//! This module handles:
//! - Assigning stable, collision-free relative paths per job
//! - Guarding every path against escaping the job directory
//! - Streaming response bodies into scoped files that vanish on failure
//! - Computing content checksums in the same pass

mod layout;
mod traits;
mod writer;

pub use layout::{resolve_within, sanitize_file_name, PathAllocator};
pub use traits::{BodySink, StorageError, StorageResult};
pub use writer::{ScopedFile, WrittenFile};

use std::path::{Path, PathBuf};

/// Returns the directory a job writes into: `save_root/<job_id>`
pub fn job_directory(save_root: &Path, job_id: &str) -> PathBuf {
    save_root.join(job_id)
}

/// Creates the job directory, failing if the save root is not writable
///
/// # Returns
///
/// * `Ok(())` - Directory exists and is writable
/// * `Err(StorageError)` - The save root cannot be used for this job
pub async fn prepare_job_directory(job_dir: &Path) -> StorageResult<()> {
    tokio::fs::create_dir_all(job_dir)
        .await
        .map_err(|source| StorageError::Unavailable {
            path: job_dir.display().to_string(),
            source,
        })?;

    // create_dir_all succeeds on an existing read-only directory, so probe it
    let probe = job_dir.join(".write-probe");
    tokio::fs::write(&probe, b"")
        .await
        .map_err(|source| StorageError::Unavailable {
            path: job_dir.display().to_string(),
            source,
        })?;
    tokio::fs::remove_file(&probe).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_directory() {
        let dir = job_directory(Path::new("/data/harvest"), "abc");
        assert_eq!(dir, PathBuf::from("/data/harvest/abc"));
    }

    #[tokio::test]
    async fn test_prepare_job_directory_creates_nested() {
        let root = tempfile::tempdir().unwrap();
        let job_dir = root.path().join("nested").join("job");

        prepare_job_directory(&job_dir).await.unwrap();

        assert!(job_dir.is_dir());
        assert!(!job_dir.join(".write-probe").exists());
    }

    #[tokio::test]
    async fn test_prepare_job_directory_under_file_fails() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = prepare_job_directory(&blocker.join("job")).await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }
}
