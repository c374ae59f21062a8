//! Crawler module for resource discovery and download
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with rate limiting, timeouts and retry logic
//! - HTML parsing and resource extraction
//! - Job-wide URL deduplication
//! - Task queueing and the bounded worker pool
//! - Saving resources under the job directory

mod coordinator;
mod dedup;
mod downloader;
mod fetcher;
mod parser;
mod rate_limiter;
mod scheduler;

pub use coordinator::{run_job, Coordinator};
pub use dedup::DedupRegistry;
pub use downloader::DownloadManager;
pub use fetcher::{build_http_client, FetchMeta, FetchedPage, Fetcher, RetryPolicy};
pub use parser::{extract_css_references, extract_resources, DiscoveredResource, ExtractedResources};
pub use rate_limiter::RateLimiter;
pub use scheduler::{Task, TaskKind, TaskQueue};
