//! rss-poller - periodic RSS feed aggregation
//!
//! Selects the least recently fetched feeds on a fixed interval, fetches
//! them with a bounded pool of workers and stores new items as posts.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod poller;
pub mod shutdown;

pub use config::Config;
pub use db::Database;
pub use error::{PollerError, Result};
pub use feed::{
    DateErrorPolicy, Feed, FeedDocument, FeedRepository, FeedSource, FetchedItem, HttpFeedFetcher,
    NewPost, Post, PostIngester, SqliteFeedRepository,
};
pub use poller::{Coordinator, PollerOptions, PollerState, PollerStats};
pub use shutdown::{Shutdown, ShutdownSignal};
