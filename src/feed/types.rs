//! Feed and post types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A subscribed RSS feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Feed ID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Last time a worker picked the feed up. `None` until the first fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A post extracted from a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Post ID.
    pub id: Uuid,
    /// Feed this post belongs to.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Post description, `None` when the feed left it empty.
    pub description: Option<String>,
    /// When the post was published.
    pub published_at: DateTime<Utc>,
    /// Source URL. Unique within a feed.
    pub url: String,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New post for creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    /// Feed ID.
    pub feed_id: Uuid,
    /// Post title.
    pub title: String,
    /// Post description.
    pub description: Option<String>,
    /// When the post was published.
    pub published_at: DateTime<Utc>,
    /// Source URL.
    pub url: String,
}

impl NewPost {
    /// Create a new post without a description.
    pub fn new(
        feed_id: Uuid,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id,
            title: title.into(),
            description: None,
            published_at,
            url: url.into(),
        }
    }

    /// Set the description. An empty description stays `None`.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }
}

/// One `item` of a fetched feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedItem {
    /// Item title.
    pub title: String,
    /// Link to the original article.
    pub link: String,
    /// Item description.
    pub description: String,
    /// Publication date exactly as the feed wrote it.
    pub pub_date: String,
}

/// A fetched and decoded feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    /// Channel title, if present.
    pub title: Option<String>,
    /// Items in document order.
    pub items: Vec<FetchedItem>,
}
