//! Job queue shared by every worker of a run
//!
//! This module handles:
//! - Strict priority ordering (lower values are popped first)
//! - FIFO tie-break between jobs of equal priority
//! - Blocking pops that wait for work or for completion
//! - Completion, either explicit or once no job is queued or in flight

use crate::crawler::job::Job;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// A job waiting in the heap with its arrival sequence number
#[derive(Debug)]
struct QueuedJob {
    job: Job,
    seq: u64,
}

// Lower priority values, then lower sequence numbers, are popped first from
// the max-heap, so both comparisons are reversed
impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .job
            .priority()
            .cmp(&self.job.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    /// Jobs handed to a worker whose `ScheduledJob` is still alive
    in_flight: usize,
    completed: bool,
}

/// Multi-producer, multi-consumer priority queue of jobs
///
/// All state sits behind one mutex that is never held across an await; the
/// `Notify` plays the part of the not-empty condition.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

/// A job handed to a worker
///
/// The job counts as in flight until this value is dropped, which keeps the
/// queue from reporting exhaustion while its children may still be pushed.
#[derive(Debug)]
pub struct ScheduledJob<'a> {
    job: Job,
    queue: &'a JobQueue,
}

impl Deref for ScheduledJob<'_> {
    type Target = Job;

    fn deref(&self) -> &Job {
        &self.job
    }
}

impl Drop for ScheduledJob<'_> {
    fn drop(&mut self) {
        self.queue.finish_one();
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a job to the queue
    ///
    /// Never blocks. Returns false, dropping the job, once the queue is
    /// completed.
    pub fn push(&self, job: Job) -> bool {
        {
            let mut state = self.lock();
            if state.completed {
                return false;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(QueuedJob { job, seq });
        }
        self.available.notify_one();
        true
    }

    /// Takes the highest-priority job, waiting while the queue is empty
    ///
    /// Returns None once the queue is completed, either by `complete` or
    /// because the heap drained with nothing left in flight. Jobs still queued
    /// at that point are never handed out.
    pub async fn pop(&self) -> Option<ScheduledJob<'_>> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Registered before the state check so a push in between is not lost
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.completed {
                    return None;
                }

                if let Some(queued) = state.heap.pop() {
                    state.in_flight += 1;
                    return Some(ScheduledJob {
                        job: queued.job,
                        queue: self,
                    });
                }

                if state.in_flight == 0 {
                    state.completed = true;
                    drop(state);
                    tracing::debug!("Job queue exhausted");
                    self.available.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks that no more jobs will be handed out and wakes every waiter
    ///
    /// Calling it again is a no-op.
    pub fn complete(&self) {
        let newly_completed = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.completed, true)
        };

        if newly_completed {
            tracing::debug!("Job queue completed");
        }
        self.available.notify_waiters();
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Number of jobs waiting in the heap
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// Number of popped jobs that are still being processed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn finish_one(&self) {
        let exhausted = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 && state.heap.is_empty() && !state.completed {
                state.completed = true;
                true
            } else {
                false
            }
        };

        if exhausted {
            tracing::debug!("Job queue exhausted");
            self.available.notify_waiters();
        }
    }
}
