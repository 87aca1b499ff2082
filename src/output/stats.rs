//! Crawl statistics
//!
//! This module provides the end-of-run counters of a crawl and their
//! console rendering.

use serde::Serialize;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages a fetch was started for, successful or not
    pub pages_visited: u64,

    /// Fetches that failed (network, status, timeout, cancellation)
    pub fetch_failures: u64,

    /// Records handed to the sinks and subscribers
    pub records_published: u64,

    /// Pages that yielded no record because extraction failed
    pub extraction_failures: u64,

    /// Individual sink publish calls that failed
    pub sink_failures: u64,

    /// Child jobs accepted by the queue
    pub jobs_enqueued: u64,

    /// Discovered links dropped by the blacklist
    pub links_blacklisted: u64,

    /// Discovered links dropped because they were already claimed
    pub links_duplicate: u64,

    /// Wall-clock duration of the run
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

impl CrawlStats {
    /// Fraction of visited pages that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pages_visited > 0 {
            (self.records_published as f64 / self.pages_visited as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Pages visited: {}", stats.pages_visited);
    println!("  Records published: {}", stats.records_published);
    println!("  Jobs enqueued: {}", stats.jobs_enqueued);
    println!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Links Dropped:");
    println!("  Blacklisted: {}", stats.links_blacklisted);
    println!("  Already claimed: {}", stats.links_duplicate);
    println!();

    let failures = stats.fetch_failures + stats.extraction_failures + stats.sink_failures;
    if failures > 0 {
        println!("Error Summary:");
        println!("  Fetch failures: {}", stats.fetch_failures);
        println!("  Extraction failures: {}", stats.extraction_failures);
        println!("  Sink failures: {}", stats.sink_failures);
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages produced a record)",
        stats.success_rate(),
        stats.records_published,
        stats.pages_visited
    );
}
