//! Periodic feed selection and dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{Job, PollerStats};
use crate::feed::{Feed, FeedRepository};
use crate::shutdown::ShutdownSignal;
use crate::PollerError;

/// Shortest tick period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Selects due feeds on a fixed interval and hands them to the workers.
///
/// Each hand-off first takes one of `concurrency` dispatch permits, so the
/// scheduler blocks while every worker is busy instead of queueing jobs.
pub struct Scheduler {
    repo: Arc<dyn FeedRepository>,
    jobs: mpsc::Sender<Job>,
    permits: Arc<Semaphore>,
    poll_interval: Duration,
    concurrency: usize,
    shutdown: ShutdownSignal,
    stats: Arc<PollerStats>,
}

impl Scheduler {
    pub(crate) fn new(
        repo: Arc<dyn FeedRepository>,
        jobs: mpsc::Sender<Job>,
        poll_interval: Duration,
        concurrency: usize,
        shutdown: ShutdownSignal,
        stats: Arc<PollerStats>,
    ) -> Self {
        Self {
            repo,
            jobs,
            permits: Arc::new(Semaphore::new(concurrency)),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            concurrency,
            shutdown,
            stats,
        }
    }

    /// Tick until shutdown is signalled.
    ///
    /// The first tick fires immediately. Returning drops the job sender,
    /// which closes the channel for the workers.
    pub async fn run(mut self) {
        info!(
            "Scheduler started: every {:?}, {} feed(s) per tick",
            self.poll_interval, self.concurrency
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.dispatch_due_feeds().await {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one tick. Returns `false` if the tick was cut short by shutdown
    /// or the workers are gone.
    async fn dispatch_due_feeds(&mut self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }

        let feeds = match self.repo.select_due_feeds(self.concurrency).await {
            Ok(feeds) => feeds,
            Err(e) => {
                let e = PollerError::Selection(e.to_string());
                error!("{}; skipping tick", e);
                return true;
            }
        };

        if feeds.is_empty() {
            debug!("No feeds to poll");
            return true;
        }
        debug!("Dispatching {} feed(s)", feeds.len());

        for feed in feeds {
            if !self.dispatch(feed).await {
                return false;
            }
        }
        true
    }

    async fn dispatch(&mut self, feed: Feed) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let feed_id = feed.id;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            sent = self.jobs.send(Job::new(feed, permit)) => match sent {
                Ok(()) => {
                    self.stats.record_dispatch();
                    debug!("Dispatched feed {}", feed_id);
                    true
                }
                Err(_) => {
                    error!("Job channel closed; no workers left");
                    false
                }
            },
        }
    }
}
