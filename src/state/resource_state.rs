//! Resource kinds, outcomes and per-resource records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The category of a discovered resource
///
/// The kind decides the subdirectory a resource is saved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Script,
    Style,
    Font,
    Media,
}

impl ResourceKind {
    /// Directory name used under the job directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Script => "script",
            Self::Style => "style",
            Self::Font => "font",
            Self::Media => "media",
        }
    }

    /// Guesses a kind from a file extension, defaulting to `Image`
    ///
    /// Used for references found inside CSS, where the surrounding markup
    /// carries no type information.
    pub fn from_extension(path: &str) -> Self {
        let ext = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("woff" | "woff2" | "ttf" | "otf" | "eot") => Self::Font,
            Some("css") => Self::Style,
            Some("js" | "mjs") => Self::Script,
            Some("mp4" | "webm" | "ogg" | "ogv" | "mp3" | "wav" | "m4a" | "flac" | "vtt") => {
                Self::Media
            }
            _ => Self::Image,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Terminal outcome of one discovered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    Failed,
    SkippedDuplicate,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::SkippedDuplicate => "skipped-duplicate",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error taxonomy recorded on failed resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    Timeout,
    ResourceTooLarge,
    NetworkTransient,
    HttpClientError,
    HttpServerError,
    InvalidPath,
    Io,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error detail attached to a failed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&crate::HarvestError> for TaskError {
    fn from(err: &crate::HarvestError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The recorded result of one discovered resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resolved absolute URL
    pub url: String,

    pub kind: ResourceKind,

    /// Path relative to the job directory (absent for duplicates)
    pub path: Option<PathBuf>,

    /// Bytes written to disk
    pub size: u64,

    /// SHA-256 of the content, lowercase hex
    pub checksum: Option<String>,

    pub outcome: Outcome,

    pub error: Option<TaskError>,

    /// Fetch attempts used, including retries
    pub attempts: u32,
}

impl ResourceRecord {
    /// Builds a record for a resource that lost the dedup claim
    pub fn skipped_duplicate(url: &str, kind: ResourceKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
            path: None,
            size: 0,
            checksum: None,
            outcome: Outcome::SkippedDuplicate,
            error: None,
            attempts: 0,
        }
    }

    /// Builds a failed record from an error
    pub fn failed(
        url: &str,
        kind: ResourceKind,
        path: Option<PathBuf>,
        attempts: u32,
        err: &crate::HarvestError,
    ) -> Self {
        Self {
            url: url.to_string(),
            kind,
            path,
            size: 0,
            checksum: None,
            outcome: Outcome::Failed,
            error: Some(TaskError::from(err)),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Returns the recorded error kind, if the resource failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
