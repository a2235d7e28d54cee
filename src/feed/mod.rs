//! Feed domain: types, storage, fetching and post ingestion.

pub mod date;
pub mod fetcher;
pub mod ingester;
pub mod repository;
pub mod types;

pub use date::parse_pub_date;
pub use fetcher::{parse_document, FeedSource, HttpFeedFetcher};
pub use ingester::{DateErrorPolicy, PostIngester};
pub use repository::{FeedRepository, SqliteFeedRepository};
pub use types::{Feed, FeedDocument, FetchedItem, NewPost, Post};
