//! Job-wide registry of claimed resource URLs

use crate::url::dedup_key;
use dashmap::DashSet;
use url::Url;

/// Concurrent set of normalized URLs already scheduled for download
///
/// Claiming is a single atomic insert, so when several workers race on the
/// same URL exactly one of them wins.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: DashSet<String>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a URL for download
    ///
    /// # Returns
    ///
    /// * `true` - First claim; the caller owns the download
    /// * `false` - Already claimed, or the URL has no valid dedup key
    pub fn try_claim(&self, url: &Url) -> bool {
        match dedup_key(url) {
            Some(key) => self.seen.insert(key),
            None => false,
        }
    }

    pub fn contains(&self, url: &Url) -> bool {
        dedup_key(url).map_or(false, |key| self.seen.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_first_claim_wins() {
        let registry = DedupRegistry::new();
        assert!(registry.try_claim(&url("https://example.com/a.png")));
        assert!(!registry.try_claim(&url("https://example.com/a.png")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_claims_use_normalized_form() {
        let registry = DedupRegistry::new();
        assert!(registry.try_claim(&url("https://Example.com:443/img/a.png#x")));
        assert!(!registry.try_claim(&url("https://example.com/img/a.png")));
        assert!(registry.contains(&url("HTTPS://EXAMPLE.COM/img/a.png")));
    }

    #[test]
    fn test_query_distinguishes_resources() {
        let registry = DedupRegistry::new();
        assert!(registry.try_claim(&url("https://example.com/app.js?v=1")));
        assert!(registry.try_claim(&url("https://example.com/app.js?v=2")));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner_per_url() {
        let registry = DedupRegistry::new();
        let wins = AtomicUsize::new(0);
        let urls: Vec<Url> = (0..100)
            .map(|i| url(&format!("https://example.com/r/{}.png", i)))
            .collect();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for u in &urls {
                        if registry.try_claim(u) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::Relaxed), 100);
        assert_eq!(registry.len(), 100);
    }
}
