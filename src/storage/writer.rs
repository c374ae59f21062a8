//! Scoped file writer for streamed downloads

use crate::storage::traits::{BodySink, StorageResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Result of a committed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Bytes written
    pub size: u64,

    /// SHA-256 of the content, lowercase hex
    pub checksum: String,
}

/// A file that only survives if explicitly committed
///
/// Bytes go to `<name>.part` next to the final path, which is created
/// lazily when the first body begins, so requests that fail before any byte
/// arrives never touch the disk. [`ScopedFile::commit`] renames the part
/// file into place; until then nothing exists under the final name.
/// Dropping the guard without committing removes the part file, which covers
/// error returns as well as a cancelled future being dropped mid-transfer.
pub struct ScopedFile {
    path: PathBuf,
    part_path: PathBuf,
    file: Option<File>,
    hasher: Sha256,
    written: u64,
    committed: bool,
}

impl ScopedFile {
    pub fn new(path: PathBuf) -> Self {
        let mut part_name = path.file_name().unwrap_or_default().to_os_string();
        part_name.push(".part");
        let part_path = path.with_file_name(part_name);

        Self {
            path,
            part_path,
            file: None,
            hasher: Sha256::new(),
            written: 0,
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written by the current attempt
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Where bytes are written until the file is committed
    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    /// Flushes the part file to disk and moves it to the final path
    pub async fn commit(mut self) -> StorageResult<WrittenFile> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.sync_all().await?;
        } else {
            // empty body: still leave an (empty) file behind
            self.open().await?;
        }

        // close the handle before handing the file over
        self.file.take();
        tokio::fs::rename(&self.part_path, &self.path).await?;
        self.committed = true;

        let checksum = hex::encode(std::mem::take(&mut self.hasher).finalize());

        Ok(WrittenFile {
            size: self.written,
            checksum,
        })
    }

    async fn open(&mut self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.file = Some(File::create(&self.part_path).await?);
        Ok(())
    }
}

#[async_trait]
impl BodySink for ScopedFile {
    async fn restart(&mut self) -> std::io::Result<()> {
        self.hasher = Sha256::new();
        self.written = 0;

        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
            file.set_len(0).await?;
            file.seek(std::io::SeekFrom::Start(0)).await?;
        } else {
            self.open().await?;
        }

        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        if self.file.is_none() {
            self.open().await?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
        }
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;

        Ok(())
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        // a failed rename in commit leaves the handle closed but the part file present
        self.file.take();

        match std::fs::remove_file(&self.part_path) {
            Ok(()) => {
                tracing::debug!("Removed partial file {}", self.part_path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    "Failed to remove partial file {}: {}",
                    self.part_path.display(),
                    e
                );
            }
        }
    }
}
