//! Database schema and migrations.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records how many have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: feeds
    r#"
CREATE TABLE feeds (
    id              TEXT PRIMARY KEY,            -- UUID
    name            TEXT NOT NULL,
    url             TEXT NOT NULL UNIQUE,
    last_fetched_at TEXT,                        -- RFC 3339, NULL until first fetch
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX idx_feeds_last_fetched_at ON feeds(last_fetched_at);
"#,
    // v2: posts, unique per (feed, source URL)
    r#"
CREATE TABLE posts (
    id           TEXT PRIMARY KEY,               -- UUID
    feed_id      TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    title        TEXT NOT NULL,
    description  TEXT,
    published_at TEXT NOT NULL,
    url          TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (feed_id, url)
);

CREATE INDEX idx_posts_feed_id ON posts(feed_id);
CREATE INDEX idx_posts_published_at ON posts(published_at);
"#,
];
