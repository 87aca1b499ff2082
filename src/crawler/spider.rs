//! Crawl orchestration
//!
//! This module handles:
//! - The spider lifecycle (Idle, Running, Stopping, Stopped, Completed)
//! - Spawning the worker loops that drain the shared job queue
//! - Enforcing the page-visit limit
//! - Publishing records to sinks and subscribers
//! - Cooperative stop and hard abort

use crate::crawler::builder::SpiderConfig;
use crate::crawler::job::Job;
use crate::crawler::loader::{FetchedPage, PageLoader};
use crate::crawler::parser::{extract_record, LinkExtractor};
use crate::crawler::queue::JobQueue;
use crate::crawler::tracker::CrawledLinkTracker;
use crate::output::{CrawlStats, Record, ScraperSink};
use crate::{FetchError, HarvestError};
use scraper::Html;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a spider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiderState {
    /// Built, never run
    Idle,
    /// Workers are draining the queue
    Running,
    /// A stop was requested; workers finish their current job
    Stopping,
    /// Ended by `stop` or `abort`
    Stopped,
    /// Ended because the queue ran dry or the visit limit was reached
    Completed,
}

impl SpiderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SpiderState::Stopped | SpiderState::Completed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    fetch_failures: AtomicU64,
    records_published: AtomicU64,
    extraction_failures: AtomicU64,
    sink_failures: AtomicU64,
    jobs_enqueued: AtomicU64,
}

struct SpiderShared {
    config: SpiderConfig,
    loader: Arc<dyn PageLoader>,
    links: LinkExtractor,
    queue: JobQueue,
    sinks: Vec<Arc<dyn ScraperSink>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Record>>>,
    state: watch::Sender<SpiderState>,
    cancel: CancellationToken,
    /// Fetch slots taken so far, compared against the visit limit
    visited: AtomicUsize,
    counters: Counters,
}

/// Handle to one crawl
///
/// Cloning is cheap and every clone controls the same crawl, so one clone can
/// `stop` a run that another clone is awaiting.
#[derive(Clone)]
pub struct Spider {
    shared: Arc<SpiderShared>,
}

impl Spider {
    pub(crate) fn new(
        config: SpiderConfig,
        loader: Arc<dyn PageLoader>,
        tracker: Arc<dyn CrawledLinkTracker>,
        sinks: Vec<Arc<dyn ScraperSink>>,
    ) -> Self {
        let links = LinkExtractor::new(config.blacklist().clone(), tracker);
        let (state, _) = watch::channel(SpiderState::Idle);

        Self {
            shared: Arc::new(SpiderShared {
                config,
                loader,
                links,
                queue: JobQueue::new(),
                sinks,
                subscribers: Mutex::new(Vec::new()),
                state,
                cancel: CancellationToken::new(),
                visited: AtomicUsize::new(0),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &SpiderConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SpiderState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state change
    pub fn watch_state(&self) -> watch::Receiver<SpiderState> {
        self.shared.state.subscribe()
    }

    /// Pages a fetch was started for so far
    pub fn visited_count(&self) -> usize {
        self.shared.visited.load(Ordering::SeqCst)
    }

    /// Returns a receiver of every record published from now on
    ///
    /// The channel is unbounded so a slow subscriber never blocks a worker.
    /// It closes when the run ends, and is already closed if the run is over.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Record> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A finished run never publishes again; dropping `tx` closes `rx`
        if !self.state().is_terminal() {
            subscribers.push(tx);
        }
        rx
    }

    /// Runs the crawl with `workers` worker loops
    ///
    /// Returns once the queue is exhausted, the visit limit is reached, or a
    /// stop completed. A spider runs at most once: calling this in any state
    /// but `Idle` fails with `InvalidState`.
    pub async fn run(&self, workers: usize) -> Result<CrawlStats, HarvestError> {
        if workers == 0 {
            return Err(HarvestError::NoWorkers);
        }

        let mut rejected = None;
        self.shared.state.send_if_modified(|state| {
            if *state == SpiderState::Idle {
                *state = SpiderState::Running;
                true
            } else {
                rejected = Some(*state);
                false
            }
        });
        if let Some(state) = rejected {
            return Err(HarvestError::InvalidState { state });
        }

        let started = Instant::now();
        let config = &self.shared.config;
        tracing::info!(
            "Starting crawl at {} with {} worker(s), limit {}",
            config.start_url(),
            workers,
            config
                .limit()
                .map_or_else(|| "none".to_string(), |l| l.to_string())
        );

        // Declared before the workers so it is dropped after them
        let mut finish = RunFinish {
            shared: &self.shared,
            drained: false,
        };

        self.shared.links.tracker().try_claim(config.start_url());
        let seed = Job::seed(
            config.base_url().clone(),
            config.start_url().clone(),
            config.plan(),
        );
        self.shared.queue.push(seed);

        let mut workers_set = JoinSet::new();
        for worker_id in 0..workers {
            let shared = Arc::clone(&self.shared);
            workers_set.spawn(async move { shared.worker_loop(worker_id).await });
        }

        while let Some(result) = workers_set.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        finish.drained = true;
        drop(finish);

        let stats = self.stats(started.elapsed());
        tracing::info!(
            "Crawl {:?}: {} page(s) visited, {} record(s) published",
            self.state(),
            stats.pages_visited,
            stats.records_published
        );
        Ok(stats)
    }

    /// Stops the crawl and waits until every worker has exited
    ///
    /// No further job is popped; fetches already started run to completion.
    /// Safe to call at any time and any number of times. Stopping an idle
    /// spider moves it straight to `Stopped`.
    pub async fn stop(&self) {
        let mut rx = self.request_stop();
        // The sender lives in `shared`, which this handle keeps alive
        let _ = rx.wait_for(SpiderState::is_terminal).await;
    }

    /// Stops the crawl, cancelling fetches that are in progress
    pub async fn abort(&self) {
        tracing::warn!("Aborting crawl");
        let mut rx = self.request_stop();
        self.shared.cancel.cancel();
        let _ = rx.wait_for(SpiderState::is_terminal).await;
    }

    fn request_stop(&self) -> watch::Receiver<SpiderState> {
        let rx = self.shared.state.subscribe();

        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut never_ran = false;
        let requested = self.shared.state.send_if_modified(|state| match state {
            SpiderState::Idle => {
                *state = SpiderState::Stopped;
                never_ran = true;
                true
            }
            SpiderState::Running => {
                *state = SpiderState::Stopping;
                true
            }
            _ => false,
        });
        if never_ran {
            subscribers.clear();
        }
        drop(subscribers);
        if requested {
            tracing::info!("Stop requested");
        }

        self.shared.queue.complete();
        rx
    }

    /// Snapshot of the crawl counters
    pub fn stats(&self, elapsed: std::time::Duration) -> CrawlStats {
        let counters = &self.shared.counters;
        CrawlStats {
            pages_visited: self.visited_count() as u64,
            fetch_failures: counters.fetch_failures.load(Ordering::Relaxed),
            records_published: counters.records_published.load(Ordering::Relaxed),
            extraction_failures: counters.extraction_failures.load(Ordering::Relaxed),
            sink_failures: counters.sink_failures.load(Ordering::Relaxed),
            jobs_enqueued: counters.jobs_enqueued.load(Ordering::Relaxed),
            links_blacklisted: self.shared.links.blacklisted_count(),
            links_duplicate: self.shared.links.duplicate_count(),
            elapsed,
        }
    }
}

/// Ends a run when `run` returns or its future is dropped
///
/// A dropped `run` has already aborted its workers, so it ends as `Stopped`
/// and any pending `stop` or `abort` call returns.
struct RunFinish<'a> {
    shared: &'a SpiderShared,
    drained: bool,
}

impl Drop for RunFinish<'_> {
    fn drop(&mut self) {
        if !self.drained {
            tracing::warn!("Crawl dropped while running");
            self.shared.queue.complete();
        }
        self.shared.finish(self.drained);
    }
}

impl SpiderShared {
    /// Closes every subscriber channel and publishes the terminal state
    fn finish(&self, drained: bool) {
        // Held across the state change so `subscribe` sees either a live run
        // or a terminal state
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.clear();

        self.state.send_modify(|state| {
            *state = if drained && *state != SpiderState::Stopping {
                SpiderState::Completed
            } else {
                SpiderState::Stopped
            };
        });
    }

    async fn worker_loop(&self, worker_id: usize) {
        tracing::debug!("Worker {} started", worker_id);

        while let Some(job) = self.queue.pop().await {
            if !self.reserve_visit() {
                // Limit reached: the job is dropped and the queue is closed
                self.queue.complete();
                continue;
            }

            self.visit(&job, worker_id).await;
        }

        tracing::debug!("Worker {} exiting", worker_id);
    }

    /// Takes one visit slot; false once the limit is used up
    ///
    /// Taking the last slot also closes the queue, so no worker waits for
    /// jobs that would be dropped anyway.
    fn reserve_visit(&self) -> bool {
        let Some(limit) = self.config.limit() else {
            self.visited.fetch_add(1, Ordering::SeqCst);
            return true;
        };

        let reserved = self
            .visited
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |visited| {
                (visited < limit).then_some(visited + 1)
            });

        match reserved {
            Ok(previous) => {
                if previous + 1 == limit {
                    tracing::info!("Visit limit of {} reached", limit);
                    self.queue.complete();
                }
                true
            }
            Err(_) => false,
        }
    }

    async fn visit(&self, job: &Job, worker_id: usize) {
        tracing::debug!(
            "Worker {} fetching {} (depth {}, priority {})",
            worker_id,
            job.url(),
            job.depth(),
            job.priority()
        );

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled {
                url: job.url().to_string(),
            }),
            result = self.loader.load(job.url(), self.config.cookies()) => result,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Dropping {}: {}", job.url(), e);
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let (record, children) = self.process_page(&page, job);

        if let Some(record) = record {
            self.publish(record).await;
        }

        for child in children {
            if self.queue.push(child) {
                self.counters.jobs_enqueued.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Parses the page and runs both extractors
    ///
    /// Kept synchronous: the parsed document must not be held across an await.
    fn process_page(&self, page: &FetchedPage, job: &Job) -> (Option<Record>, Vec<Job>) {
        let document = Html::parse_document(&page.body);

        let record = if self.config.schema().is_empty() {
            None
        } else {
            match extract_record(&document, self.config.schema(), &page.url) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("No record from {}: {}", page.url, e);
                    self.counters
                        .extraction_failures
                        .fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        };

        let children = self.links.extract_links(&document, job).collect();
        (record, children)
    }

    async fn publish(&self, record: Record) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(&record).await {
                tracing::warn!("Sink {} failed for {}: {}", sink.name(), record.url, e);
                self.counters.sink_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.retain(|tx| tx.send(record.clone()).is_ok());
        }

        self.counters
            .records_published
            .fetch_add(1, Ordering::Relaxed);
    }
}
