use crate::UrlError;
use url::Url;

/// Normalizes a URL into the form used as a dedup key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything but http/https
/// 3. Lowercase scheme and host (done by the parser for special schemes),
///    drop the default port
/// 4. Remove the fragment
/// 5. Remove a trailing slash from a non-root path
///
/// Query strings are kept as-is: `app.js?v=1` and `app.js?v=2` are
/// different resources.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/img/#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/img");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Same as [`normalize_url`] for an already parsed URL
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let trimmed = trimmed.to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}

/// Returns the dedup key for a URL
pub fn dedup_key(url: &Url) -> Option<String> {
    normalize_parsed(url.clone()).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_scheme_and_host() {
        let url = normalize_url("HTTPS://CDN.Example.COM/Assets/Logo.PNG").unwrap();
        // path case is significant and preserved
        assert_eq!(url.as_str(), "https://cdn.example.com/Assets/Logo.PNG");
    }

    #[test]
    fn test_remove_default_port() {
        let url = normalize_url("https://example.com:443/a.js").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a.js");
    }

    #[test]
    fn test_keep_non_default_port() {
        let url = normalize_url("http://127.0.0.1:8080/a.js").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/a.js");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let url = normalize_url("https://example.com/images/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/images");
    }

    #[test]
    fn test_root_slash_kept() {
        let url = normalize_url("https://example.com/").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let url = normalize_url("https://example.com/sprite.svg#icon-home").unwrap();
        assert_eq!(url.as_str(), "https://example.com/sprite.svg");
    }

    #[test]
    fn test_query_preserved() {
        let url = normalize_url("https://example.com/app.js?v=2&b=1").unwrap();
        assert_eq!(url.as_str(), "https://example.com/app.js?v=2&b=1");
    }

    #[test]
    fn test_reject_non_http_scheme() {
        assert!(matches!(
            normalize_url("ftp://example.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            normalize_url("data:image/png;base64,AAAA"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_reject_malformed() {
        assert!(matches!(normalize_url("not a url"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_equivalent_urls_share_key() {
        let a = Url::parse("HTTPS://Example.com/img/a.png#x").unwrap();
        let b = Url::parse("https://example.com:443/img/a.png").unwrap();
        assert_eq!(dedup_key(&a), dedup_key(&b));
    }
}
