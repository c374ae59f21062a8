//! URL handling module for Sumi-Harvest
//!
//! This module provides seed URL validation and the normalization used to
//! key the dedup registry.

mod normalize;

use crate::UrlError;
use url::Url;

// Re-export main functions
pub use normalize::{dedup_key, normalize_parsed, normalize_url};

/// Validates a seed URL supplied by a caller
///
/// The seed must parse as an absolute URL, use http or https, and carry a
/// host. Unlike [`normalize_url`], the URL is returned untouched so the
/// request goes out exactly as given (minus any fragment).
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::validate_seed_url;
///
/// assert!(validate_seed_url("https://example.com/gallery").is_ok());
/// assert!(validate_seed_url("javascript:alert(1)").is_err());
/// assert!(validate_seed_url("/relative/path").is_err());
/// ```
pub fn validate_seed_url(seed: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(seed.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns true if the URL uses a scheme the engine can download
pub fn is_downloadable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}
