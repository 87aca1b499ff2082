//! Crawled-link tracking
//!
//! The tracker is the only deduplication mechanism of a run: a URL is
//! scheduled if and only if its claim succeeded.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use url::Url;

/// Capability answering "has this URL already been scheduled?"
///
/// `try_claim` is a single check-and-set. Implementations must make it atomic
/// across workers: when several callers race on the same URL exactly one of
/// them gets `true`. A persistent implementation may keep claims across runs.
pub trait CrawledLinkTracker: Send + Sync {
    /// Records `url` as claimed; returns false if it already was
    fn try_claim(&self, url: &Url) -> bool;

    /// Number of URLs claimed so far
    fn claimed_count(&self) -> usize;
}

/// Claims kept in memory for the lifetime of one run
#[derive(Debug, Default)]
pub struct InMemoryCrawledLinkTracker {
    claimed: Mutex<HashSet<String>>,
}

impl InMemoryCrawledLinkTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrawledLinkTracker for InMemoryCrawledLinkTracker {
    fn try_claim(&self, url: &Url) -> bool {
        let claimed = self
            .claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.as_str().to_string());

        tracing::trace!("Claim {} -> {}", url, claimed);
        claimed
    }

    fn claimed_count(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
