//! Feed-polling core.
//!
//! A [`Scheduler`] selects the least recently fetched feeds on every tick
//! and hands them, one [`Job`] at a time, to a fixed pool of [`Worker`]s.
//! The [`Coordinator`] wires the two together and drains the pool on
//! shutdown.

mod coordinator;
mod scheduler;
mod worker;

pub use coordinator::{Coordinator, PollerState};
pub use scheduler::Scheduler;
pub use worker::Worker;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit};

use crate::config::PollerConfig;
use crate::feed::{DateErrorPolicy, Feed};

/// Receiving side of the job hand-off, shared by all workers.
pub(crate) type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// One feed handed to one worker for one fetch cycle.
///
/// Holds one of the scheduler's dispatch permits; the slot is released
/// when the job is dropped.
#[derive(Debug)]
pub struct Job {
    feed: Feed,
    _permit: OwnedSemaphorePermit,
}

impl Job {
    pub(crate) fn new(feed: Feed, permit: OwnedSemaphorePermit) -> Self {
        Self {
            feed,
            _permit: permit,
        }
    }

    /// The feed to fetch.
    pub fn feed(&self) -> &Feed {
        &self.feed
    }
}

/// Immutable settings for one poller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerOptions {
    /// Time between scheduler ticks.
    pub poll_interval: Duration,
    /// Number of workers and maximum number of feeds selected per tick.
    pub concurrency: usize,
    /// Deadline for a single fetch-and-ingest job.
    pub job_timeout: Duration,
    /// Date error policy handed to the ingester.
    pub date_error_policy: DateErrorPolicy,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

impl From<&PollerConfig> for PollerOptions {
    fn from(config: &PollerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            concurrency: config.concurrency,
            job_timeout: config.job_timeout(),
            date_error_policy: config.date_error_policy,
        }
    }
}

/// Counters shared by the scheduler and workers.
#[derive(Debug, Default)]
pub struct PollerStats {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    posts_created: AtomicUsize,
}

impl PollerStats {
    /// Jobs handed to the worker pool.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// Jobs that finished without error.
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Jobs that ended with an error or hit their deadline.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Jobs that have finished either way.
    pub fn finished(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// Posts inserted by successful jobs.
    pub fn posts_created(&self) -> usize {
        self.posts_created.load(Ordering::SeqCst)
    }

    pub(crate) fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_success(&self, posts: usize) {
        self.posts_created.fetch_add(posts, Ordering::SeqCst);
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}
