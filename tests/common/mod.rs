//! Test helpers for integration tests.
//!
//! Provides an in-memory repository, a gated feed source and a local HTTP
//! server for feed documents.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use rss_poller::{Database, FeedDocument, FeedSource, FetchedItem, Result, SqliteFeedRepository};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A valid RFC 1123 publication date.
pub const PUB_DATE: &str = "Mon, 02 Jan 2006 15:04:05 +0000";

/// Open an in-memory database and a repository over it.
pub async fn setup_repo() -> (Database, Arc<SqliteFeedRepository>) {
    let db = Database::open_in_memory().await.unwrap();
    let repo = Arc::new(SqliteFeedRepository::new(db.pool().clone()));
    (db, repo)
}

/// Build a fetched item.
pub fn item(link: &str, pub_date: &str) -> FetchedItem {
    FetchedItem {
        title: format!("Title for {link}"),
        link: link.to_string(),
        description: String::new(),
        pub_date: pub_date.to_string(),
    }
}

/// Poll `cond` until it holds, panicking after [`DEFAULT_TIMEOUT`].
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Feed source whose fetches block until the test lets them through.
///
/// Tracks how many fetches have started and how many ran at once.
pub struct GatedSource {
    gate: Semaphore,
    documents: HashMap<String, FeedDocument>,
    started: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedSource {
    /// A closed gate serving empty documents.
    pub fn new() -> Arc<Self> {
        Self::with_documents(HashMap::new())
    }

    /// A closed gate serving `documents` by URL, empty for unknown URLs.
    pub fn with_documents(documents: HashMap<String, FeedDocument>) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            documents,
            started: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Let `n` more fetches complete.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Let every current and future fetch complete.
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// URLs in the order their fetches started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedSource for GatedSource {
    async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(url.to_string());

        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }

        Ok(self.documents.get(url).cloned().unwrap_or_default())
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Render an RSS 2.0 document from `(title, link, pubDate)` triples.
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>Integration test feed</description>
"#,
    );
    for (title, link, pub_date) in items {
        body.push_str(&format!(
            "    <item>\n      <title>{title}</title>\n      <link>{link}</link>\n      <pubDate>{pub_date}</pubDate>\n    </item>\n"
        ));
    }
    body.push_str("  </channel>\n</rss>\n");
    body
}
