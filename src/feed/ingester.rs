//! Post ingestion.
//!
//! Turns fetched items into stored posts. Duplicate suppression is left to
//! the storage uniqueness constraint: a duplicate insert is skipped, every
//! other storage failure stops the batch.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::date::parse_pub_date;
use super::repository::FeedRepository;
use super::types::{FetchedItem, NewPost};
use crate::Result;

/// What happens to the rest of a feed when one item's date does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateErrorPolicy {
    /// Fail the job; later items of the feed are not processed.
    #[default]
    AbortFeed,
    /// Log the item and continue with the next one.
    SkipItem,
}

/// Writes fetched items as posts.
pub struct PostIngester {
    repo: Arc<dyn FeedRepository>,
    date_policy: DateErrorPolicy,
}

impl PostIngester {
    /// Create a new ingester.
    pub fn new(repo: Arc<dyn FeedRepository>, date_policy: DateErrorPolicy) -> Self {
        Self { repo, date_policy }
    }

    /// Store `items` for `feed_id`, in order.
    ///
    /// Returns the number of newly inserted posts. Posts inserted before an
    /// error stay stored.
    pub async fn ingest(&self, feed_id: Uuid, items: &[FetchedItem]) -> Result<usize> {
        let mut created = 0;

        for item in items {
            let published_at = match parse_pub_date(&item.pub_date) {
                Ok(dt) => dt,
                Err(e) if self.date_policy == DateErrorPolicy::SkipItem => {
                    warn!("Skipping item {:?} of feed {}: {}", item.link, feed_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let post = NewPost::new(feed_id, &item.title, &item.link, published_at)
                .with_description(&item.description);

            match self.repo.create_post(&post).await {
                Ok(_) => created += 1,
                Err(e) if e.is_unique_violation() => {
                    debug!("Post {} already exists for feed {}, skipping", item.link, feed_id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::feed::repository::SqliteFeedRepository;
    use crate::PollerError;

    fn item(link: &str, pub_date: &str) -> FetchedItem {
        FetchedItem {
            title: format!("Title for {link}"),
            link: link.to_string(),
            description: String::new(),
            pub_date: pub_date.to_string(),
        }
    }

    const DATE: &str = "Mon, 02 Jan 2006 15:04:05 +0000";

    async fn setup() -> (Database, Arc<SqliteFeedRepository>, Uuid) {
        let db = Database::open_in_memory().await.unwrap();
        let repo = Arc::new(SqliteFeedRepository::new(db.pool().clone()));
        let feed = repo
            .create_feed("Example", "https://example.com/rss")
            .await
            .unwrap();
        (db, repo, feed.id)
    }

    #[tokio::test]
    async fn test_ingest_inserts_all_items() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::AbortFeed);

        let mut with_description = item("https://example.com/a", DATE);
        with_description.description = "About A".into();
        let items = vec![
            with_description,
            item("https://example.com/b", "Tue, 03 Jan 2006 10:00:00 GMT"),
        ];

        assert_eq!(ingester.ingest(feed_id, &items).await.unwrap(), 2);

        let posts = repo.list_posts_by_feed(feed_id).await.unwrap();
        assert_eq!(posts.len(), 2);
        let a = posts
            .iter()
            .find(|p| p.url == "https://example.com/a")
            .unwrap();
        assert_eq!(a.description.as_deref(), Some("About A"));
        let b = posts
            .iter()
            .find(|p| p.url == "https://example.com/b")
            .unwrap();
        assert_eq!(b.description, None);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::AbortFeed);
        let items = vec![
            item("https://example.com/a", DATE),
            item("https://example.com/b", DATE),
        ];

        assert_eq!(ingester.ingest(feed_id, &items).await.unwrap(), 2);
        assert_eq!(ingester.ingest(feed_id, &items).await.unwrap(), 0);
        assert_eq!(repo.count_posts(feed_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_existing_post_is_skipped_and_rest_processed() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::AbortFeed);

        ingester
            .ingest(feed_id, &[item("https://example.com/old", DATE)])
            .await
            .unwrap();

        let items = vec![
            item("https://example.com/old", DATE),
            item("https://example.com/new", DATE),
        ];
        assert_eq!(ingester.ingest(feed_id, &items).await.unwrap(), 1);
        assert_eq!(repo.count_posts(feed_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bad_date_aborts_remaining_items() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::AbortFeed);
        let items = vec![
            item("https://example.com/1", DATE),
            item("https://example.com/2", "not-a-date"),
            item("https://example.com/3", DATE),
        ];

        let err = ingester.ingest(feed_id, &items).await.unwrap_err();
        assert!(matches!(err, PollerError::DateFormat(ref s) if s == "not-a-date"));

        let urls: Vec<String> = repo
            .list_posts_by_feed(feed_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(urls, vec!["https://example.com/1".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_date_skip_item_policy() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::SkipItem);
        let items = vec![
            item("https://example.com/1", DATE),
            item("https://example.com/2", "not-a-date"),
            item("https://example.com/3", DATE),
        ];

        assert_eq!(ingester.ingest(feed_id, &items).await.unwrap(), 2);
        assert_eq!(repo.count_posts(feed_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repository_error_aborts() {
        let (_db, repo, _feed_id) = setup().await;
        let ingester = PostIngester::new(repo.clone(), DateErrorPolicy::SkipItem);

        // Unknown feed id: foreign key failure, not a duplicate.
        let err = ingester
            .ingest(Uuid::new_v4(), &[item("https://example.com/1", DATE)])
            .await
            .unwrap_err();
        assert!(matches!(err, PollerError::Repository(_)));
    }

    #[tokio::test]
    async fn test_empty_items() {
        let (_db, repo, feed_id) = setup().await;
        let ingester = PostIngester::new(repo, DateErrorPolicy::default());
        assert_eq!(ingester.ingest(feed_id, &[]).await.unwrap(), 0);
    }
}
