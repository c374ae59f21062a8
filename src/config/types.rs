use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Defaults applied to every submitted job
    #[serde(default)]
    pub engine: JobConfig,

    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Per-job engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Number of worker loops draining the job's task queue
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Maximum request starts per rate interval
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit_per_interval: u32,

    /// Length of the rate window (milliseconds)
    #[serde(rename = "rate-interval-ms", default = "default_rate_interval_ms")]
    pub rate_interval_ms: u64,

    /// Whole-request timeout covering connect and transfer (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Directory under which `<job_id>/<kind>/<file>` is written
    #[serde(rename = "save-root", default = "default_save_root")]
    pub save_root: PathBuf,

    /// Attempt ceiling per request, first attempt included
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt (milliseconds); doubles per attempt
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff sleep (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Largest response body accepted (bytes)
    #[serde(rename = "max-response-bytes", default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            rate_limit_per_interval: default_rate_limit(),
            rate_interval_ms: default_rate_interval_ms(),
            timeout_ms: default_timeout_ms(),
            save_root: default_save_root(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

fn default_max_concurrent() -> u32 {
    5
}

fn default_rate_limit() -> u32 {
    100
}

fn default_rate_interval_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_save_root() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_max_response_bytes() -> u64 {
    50 * 1024 * 1024
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version` or `CrawlerName/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

fn default_crawler_name() -> String {
    "SumiHarvest".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Write `manifest.json` into the job directory at terminal status
    #[serde(rename = "write-manifest", default = "default_true")]
    pub write_manifest: bool,

    /// Write `summary.md` into the job directory at terminal status
    #[serde(rename = "write-summary", default = "default_true")]
    pub write_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_manifest: true,
            write_summary: true,
        }
    }
}

fn default_true() -> bool {
    true
}
