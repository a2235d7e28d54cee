//! Worker loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{Job, JobQueue, PollerStats};
use crate::feed::{Feed, FeedRepository, FeedSource, PostIngester};
use crate::shutdown::ShutdownSignal;
use crate::{PollerError, Result};

enum Next {
    Job(Job),
    Closed,
    Cancelled,
}

/// One of the pool's symmetric worker loops.
///
/// Runs one job at a time: mark the feed fetched, fetch it, ingest its
/// items, all under a fixed per-job deadline that the root shutdown signal
/// does not shorten.
pub struct Worker {
    id: usize,
    jobs: JobQueue,
    repo: Arc<dyn FeedRepository>,
    source: Arc<dyn FeedSource>,
    ingester: Arc<PostIngester>,
    job_timeout: Duration,
    shutdown: ShutdownSignal,
    stats: Arc<PollerStats>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        jobs: JobQueue,
        repo: Arc<dyn FeedRepository>,
        source: Arc<dyn FeedSource>,
        ingester: Arc<PostIngester>,
        job_timeout: Duration,
        shutdown: ShutdownSignal,
        stats: Arc<PollerStats>,
    ) -> Self {
        Self {
            id,
            jobs,
            repo,
            source,
            ingester,
            job_timeout,
            shutdown,
            stats,
        }
    }

    /// Run until the job channel closes.
    ///
    /// Once shutdown is signalled the worker only finishes jobs that were
    /// already handed off, then exits when the scheduler drops the sender.
    pub async fn run(mut self) {
        debug!("Worker {} started", self.id);

        loop {
            let next = tokio::select! {
                biased;
                job = recv_job(&self.jobs) => match job {
                    Some(job) => Next::Job(job),
                    None => Next::Closed,
                },
                _ = self.shutdown.cancelled() => Next::Cancelled,
            };

            match next {
                Next::Job(job) => self.process(job).await,
                Next::Closed => break,
                Next::Cancelled => {
                    self.drain().await;
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    // A send that raced with cancellation may still land, so wait for the
    // channel to close rather than stopping at the first empty poll.
    async fn drain(&self) {
        debug!("Worker {} draining", self.id);
        while let Some(job) = recv_job(&self.jobs).await {
            self.process(job).await;
        }
    }

    async fn process(&self, job: Job) {
        let Job { feed, _permit: permit } = job;
        debug!("Worker {} processing feed {} ({})", self.id, feed.id, feed.url);

        let outcome = match timeout(self.job_timeout, self.scrape(&feed)).await {
            Ok(result) => result,
            Err(_) => Err(PollerError::DeadlineExceeded(self.job_timeout)),
        };

        // Free the dispatch slot as soon as the job is over.
        drop(permit);

        match outcome {
            Ok(created) => {
                self.stats.record_success(created);
                if created > 0 {
                    info!("Feed {} updated: {} new post(s)", feed.id, created);
                } else {
                    debug!("Feed {} updated: no new posts", feed.id);
                }
            }
            Err(e) => {
                self.stats.record_failure();
                warn!("Failed to scrape feed {} ({}): {}", feed.id, feed.url, e);
            }
        }
    }

    async fn scrape(&self, feed: &Feed) -> Result<usize> {
        self.repo.mark_fetched(feed.id).await?;
        let document = self.source.fetch(&feed.url).await?;
        self.ingester.ingest(feed.id, &document.items).await
    }
}

async fn recv_job(jobs: &JobQueue) -> Option<Job> {
    jobs.lock().await.recv().await
}
