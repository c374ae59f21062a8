//! Storage traits and error types
//!
//! This module defines the sink interface response bodies are streamed into
//! and the storage error type.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Path escapes the job directory: {0}")]
    OutsideRoot(String),

    #[error("Save root unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for a streamed response body
///
/// The fetcher calls `restart` once the response headers are accepted and
/// before the first chunk of every attempt, so a retried transfer never
/// appends to the bytes of a failed one.
#[async_trait]
pub trait BodySink: Send {
    /// Discards anything written so far and prepares for a fresh body
    async fn restart(&mut self) -> std::io::Result<()>;

    /// Appends one chunk of the body
    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()>;
}

/// In-memory sink, used for the seed page
#[async_trait]
impl BodySink for Vec<u8> {
    async fn restart(&mut self) -> std::io::Result<()> {
        self.clear();
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vec_sink_restart_discards() {
        let mut sink: Vec<u8> = Vec::new();
        sink.restart().await.unwrap();
        sink.write_chunk(b"partial").await.unwrap();

        sink.restart().await.unwrap();
        sink.write_chunk(b"full body").await.unwrap();

        assert_eq!(sink, b"full body");
    }
}
