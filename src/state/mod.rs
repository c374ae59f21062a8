//! State module for tracking job and resource progress
//!
//! # Components
//!
//! - `JobStatus`: Lifecycle of a crawl job (pending, running, completed, cancelled, failed)
//! - `ResourceKind`: The category a discovered resource belongs to
//! - `ResourceRecord`: The recorded outcome of one discovered resource

mod job_status;
mod resource_state;

// Re-export main types
pub use job_status::JobStatus;
pub use resource_state::{ErrorKind, Outcome, ResourceKind, ResourceRecord, TaskError};
