//! Feed and post storage.
//!
//! [`FeedRepository`] is the only storage surface the polling core uses.
//! [`SqliteFeedRepository`] implements it over the sqlx pool and adds the
//! management queries needed for seeding and inspection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Feed, NewPost, Post};
use crate::db::{format_datetime, parse_datetime, DbPool};
use crate::{PollerError, Result};

/// Storage operations consumed by the scheduler, workers and ingester.
#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// Stamp the feed's `last_fetched_at` with the current time and return
    /// the refreshed feed.
    async fn mark_fetched(&self, feed_id: Uuid) -> Result<Feed>;

    /// Up to `limit` feeds, least recently fetched first (never-fetched
    /// feeds before all others), ties broken by id.
    async fn select_due_feeds(&self, limit: usize) -> Result<Vec<Feed>>;

    /// Insert a post.
    ///
    /// Fails with [`PollerError::UniqueConstraint`] when the feed already
    /// has a post with the same URL.
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
}

/// Row type for feeds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    last_fetched_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<FeedRow> for Feed {
    type Error = PollerError;

    fn try_from(row: FeedRow) -> Result<Self> {
        Ok(Feed {
            id: parse_uuid(&row.id)?,
            name: row.name,
            url: row.url,
            last_fetched_at: row
                .last_fetched_at
                .map(|s| parse_stored("last_fetched_at", &s))
                .transpose()?,
            created_at: parse_stored("created_at", &row.created_at)?,
            updated_at: parse_stored("updated_at", &row.updated_at)?,
        })
    }
}

/// Row type for posts.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    description: Option<String>,
    published_at: String,
    url: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = PollerError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: parse_uuid(&row.id)?,
            feed_id: parse_uuid(&row.feed_id)?,
            title: row.title,
            description: row.description,
            published_at: parse_stored("published_at", &row.published_at)?,
            url: row.url,
            created_at: parse_stored("created_at", &row.created_at)?,
            updated_at: parse_stored("updated_at", &row.updated_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| PollerError::Repository(format!("corrupt id {s:?}: {e}")))
}

fn parse_stored(column: &str, s: &str) -> Result<DateTime<Utc>> {
    parse_datetime(s).ok_or_else(|| PollerError::Repository(format!("corrupt {column}: {s:?}")))
}

const FEED_COLUMNS: &str = "id, name, url, last_fetched_at, created_at, updated_at";

const POST_COLUMNS: &str =
    "id, feed_id, title, description, published_at, url, created_at, updated_at";

/// SQLite-backed repository.
#[derive(Clone)]
pub struct SqliteFeedRepository {
    pool: DbPool,
}

impl SqliteFeedRepository {
    /// Create a new repository over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    pub async fn create_feed(&self, name: &str, url: &str) -> Result<Feed> {
        let now = format_datetime(&Utc::now());
        let query = format!(
            "INSERT INTO feeds (id, name, url, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {FEED_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(url)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        Feed::try_from(row)
    }

    /// Return the feed registered for `url`, creating it if missing.
    pub async fn ensure_feed(&self, name: &str, url: &str) -> Result<Feed> {
        if let Some(feed) = self.get_feed_by_url(url).await? {
            return Ok(feed);
        }
        match self.create_feed(name, url).await {
            Ok(feed) => Ok(feed),
            // Lost a race with another writer; the row exists now.
            Err(e) if e.is_unique_violation() => self
                .get_feed_by_url(url)
                .await?
                .ok_or_else(|| PollerError::NotFound(format!("feed {url}"))),
            Err(e) => Err(e),
        }
    }

    /// Get a feed by ID.
    pub async fn get_feed(&self, id: Uuid) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by URL.
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List a feed's posts, newest first.
    pub async fn list_posts_by_feed(&self, feed_id: Uuid) -> Result<Vec<Post>> {
        let query = format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE feed_id = $1
             ORDER BY published_at DESC, id ASC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&query)
            .bind(feed_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// Count posts stored for a feed.
    pub async fn count_posts(&self, feed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl FeedRepository for SqliteFeedRepository {
    async fn mark_fetched(&self, feed_id: Uuid) -> Result<Feed> {
        let now = format_datetime(&Utc::now());
        let query = format!(
            "UPDATE feeds SET last_fetched_at = $1, updated_at = $1
             WHERE id = $2
             RETURNING {FEED_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(&now)
            .bind(feed_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PollerError::NotFound(format!("feed {feed_id}")))?;

        Feed::try_from(row)
    }

    async fn select_due_feeds(&self, limit: usize) -> Result<Vec<Feed>> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Feed::try_from).collect()
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let now = format_datetime(&Utc::now());
        let query = format!(
            "INSERT INTO posts (id, feed_id, title, description, published_at, url, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(Uuid::new_v4().to_string())
            .bind(post.feed_id.to_string())
            .bind(&post.title)
            .bind(&post.description)
            .bind(format_datetime(&post.published_at))
            .bind(&post.url)
            .bind(&now)
            .fetch_one(&self.pool)
            .await?;

        Post::try_from(row)
    }
}
