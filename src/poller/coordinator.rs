//! Poller lifecycle: start the pool, run the scheduler, drain on shutdown.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info};

use super::{PollerOptions, PollerStats, Scheduler, Worker};
use crate::feed::{FeedRepository, FeedSource, PostIngester};
use crate::shutdown::ShutdownSignal;

/// Lifecycle state of a running poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// The scheduler is ticking.
    Running,
    /// The scheduler has stopped; workers are finishing in-flight jobs.
    Draining,
    /// Every worker has exited.
    Stopped,
}

/// Owns one poller instance: a scheduler and `concurrency` workers.
pub struct Coordinator {
    options: PollerOptions,
    repo: Arc<dyn FeedRepository>,
    source: Arc<dyn FeedSource>,
    shutdown: ShutdownSignal,
    state: watch::Sender<PollerState>,
    stats: Arc<PollerStats>,
}

impl Coordinator {
    /// Create a new coordinator. Nothing runs until [`run`](Self::run).
    pub fn new(
        options: PollerOptions,
        repo: Arc<dyn FeedRepository>,
        source: Arc<dyn FeedSource>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::Running);
        Self {
            options,
            repo,
            source,
            shutdown,
            state,
            stats: Arc::new(PollerStats::default()),
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Shared job counters.
    pub fn stats(&self) -> Arc<PollerStats> {
        self.stats.clone()
    }

    /// Run until the shutdown signal fires and every worker has exited.
    ///
    /// After cancellation no new job is dispatched; jobs already handed to
    /// a worker run to completion or to their own deadline.
    pub async fn run(self) {
        let concurrency = self.options.concurrency.max(1);
        let (tx, rx) = mpsc::channel(concurrency);
        let jobs = Arc::new(Mutex::new(rx));
        let ingester = Arc::new(PostIngester::new(
            self.repo.clone(),
            self.options.date_error_policy,
        ));

        info!(
            "Starting poller: {} worker(s), job timeout {:?}",
            concurrency, self.options.job_timeout
        );

        let mut handles = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            let worker = Worker::new(
                id,
                jobs.clone(),
                self.repo.clone(),
                self.source.clone(),
                ingester.clone(),
                self.options.job_timeout,
                self.shutdown.clone(),
                self.stats.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }
        drop(jobs);

        let scheduler = Scheduler::new(
            self.repo.clone(),
            tx,
            self.options.poll_interval,
            concurrency,
            self.shutdown.clone(),
            self.stats.clone(),
        );
        self.state.send_replace(PollerState::Running);
        scheduler.run().await;

        self.state.send_replace(PollerState::Draining);
        info!("Draining {} worker(s)", handles.len());

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }

        self.state.send_replace(PollerState::Stopped);
        info!(
            "Poller stopped: {} dispatched, {} succeeded, {} failed, {} new post(s)",
            self.stats.dispatched(),
            self.stats.succeeded(),
            self.stats.failed(),
            self.stats.posts_created()
        );
    }
}
