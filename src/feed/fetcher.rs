//! Feed fetcher.
//!
//! [`FeedSource`] is the seam the worker pool depends on; the production
//! implementation is [`HttpFeedFetcher`], which performs one GET per call
//! and decodes an RSS `channel` of `item`s. Retries are left to the next
//! scheduler tick.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::feed::types::{FeedDocument, FetchedItem};
use crate::{PollerError, Result};

/// Something that can turn a feed URL into a decoded document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and decode the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<FeedDocument>;
}

fn decode_error(e: impl std::fmt::Display) -> PollerError {
    PollerError::Decode(format!("invalid RSS document: {}", e))
}

/// Copy the text of a closed `item` child into the item.
///
/// Names are matched in full, so namespaced siblings such as `atom:link`
/// or `media:title` never replace the plain RSS fields. A repeated plain
/// field keeps its last value.
fn set_item_field(item: &mut FetchedItem, name: &str, text: &str) {
    match name {
        "title" => item.title = text.trim().to_string(),
        "link" => item.link = text.trim().to_string(),
        "description" => item.description = text.trim().to_string(),
        "pubDate" => item.pub_date = text.trim().to_string(),
        _ => {}
    }
}

/// Decode an RSS body.
///
/// The document root must contain a `channel`; its `item` children are
/// returned in document order. Missing item fields are empty strings.
pub fn parse_document(bytes: &[u8]) -> Result<FeedDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PollerError::Decode(format!("feed body is not UTF-8: {}", e)))?;

    let mut reader = Reader::from_str(text);

    // Qualified names of the currently open elements, root first.
    let mut path: Vec<String> = Vec::new();
    let mut content = String::new();
    let mut has_channel = false;
    let mut title = None;
    let mut current: Option<FetchedItem> = None;
    let mut items = Vec::new();

    loop {
        match reader.read_event().map_err(decode_error)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                path.push(name);
                content.clear();

                match path.len() {
                    2 if path[1] == "channel" => has_channel = true,
                    3 if path[1] == "channel" && path[2] == "item" => {
                        current = Some(FetchedItem::default());
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if path.len() == 1 && e.name().as_ref() == b"channel" {
                    has_channel = true;
                }
            }
            Event::Text(e) => content.push_str(&e.unescape().map_err(decode_error)?),
            Event::CData(e) => content.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => {
                let in_channel = path.len() >= 3 && path[1] == "channel";
                if in_channel && path.len() == 3 {
                    match path[2].as_str() {
                        "title" => title = Some(content.trim().to_string()),
                        "item" => items.extend(current.take()),
                        _ => {}
                    }
                } else if in_channel && path.len() == 4 && path[2] == "item" {
                    if let Some(item) = current.as_mut() {
                        set_item_field(item, &path[3], &content);
                    }
                }
                path.pop();
                content.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(decode_error(format!("unclosed element <{}>", path.join(">"))));
    }
    if !has_channel {
        return Err(decode_error("missing channel element"));
    }

    Ok(FeedDocument {
        title: title.filter(|t| !t.is_empty()),
        items,
    })
}

/// HTTP feed fetcher backed by a shared reqwest client.
///
/// The overall request deadline is owned by the caller (the worker's
/// per-job timeout), so only a connect timeout is configured here.
pub struct HttpFeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl HttpFeedFetcher {
    /// Create a fetcher from the fetcher configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| PollerError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    fn too_large(&self, size: u64) -> PollerError {
        PollerError::Network(format!(
            "feed too large: {} bytes (max {} bytes)",
            size, self.max_feed_size
        ))
    }
}

#[async_trait]
impl FeedSource for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        debug!("Fetching feed {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PollerError::Network(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PollerError::Network(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(self.too_large(content_length));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PollerError::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(self.too_large(bytes.len() as u64));
        }

        parse_document(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <atom:link href="https://example.com/index.xml" rel="self" type="application/rss+xml"/>
    <description>A test feed</description>
    <language>en-us</language>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
      <guid>https://example.com/1</guid>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second Article</title>
      <link>https://example.com/2</link>
      <pubDate>Tue, 03 Jan 2006 15:04:05 GMT</pubDate>
      <description><![CDATA[<b>Bold</b> text]]></description>
    </item>
  </channel>
</rss>"#;

        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Test Feed"));
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].title, "First Article");
        assert_eq!(doc.items[0].link, "https://example.com/1");
        assert_eq!(doc.items[0].description, "<p>Description</p>");
        assert_eq!(doc.items[0].pub_date, "Mon, 02 Jan 2006 15:04:05 +0000");
        assert_eq!(doc.items[1].title, "Second Article");
        assert_eq!(doc.items[1].description, "<b>Bold</b> text");
    }

    #[test]
    fn test_parse_document_missing_fields_default_to_empty() {
        let rss = r#"<rss><channel><item><link>https://example.com/x</link></item></channel></rss>"#;

        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.title, None);
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].link, "https://example.com/x");
        assert_eq!(doc.items[0].title, "");
        assert_eq!(doc.items[0].description, "");
        assert_eq!(doc.items[0].pub_date, "");
    }

    #[test]
    fn test_parse_document_namespaced_item_children() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Media Feed</title>
    <item>
      <atom:link href="https://example.com/1/self" rel="self"/>
      <title>Plain Title</title>
      <media:title>Media Title</media:title>
      <link>https://example.com/1</link>
      <atom:link href="https://example.com/1/alt" rel="alternate"></atom:link>
      <media:description>Media Description</media:description>
      <description>Plain Description</description>
      <pubDate>Mon, 02 Jan 2006 15:04:05 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.title, "Plain Title");
        assert_eq!(item.link, "https://example.com/1");
        assert_eq!(item.description, "Plain Description");
        assert_eq!(item.pub_date, "Mon, 02 Jan 2006 15:04:05 +0000");
    }

    #[test]
    fn test_parse_document_repeated_field_keeps_last() {
        let rss = r#"<rss><channel><item>
            <link>https://example.com/old</link>
            <link>https://example.com/new</link>
        </item></channel></rss>"#;

        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.items[0].link, "https://example.com/new");
    }

    #[test]
    fn test_parse_document_unclosed_element() {
        let err = parse_document(b"<rss><channel><item><title>T</title>").unwrap_err();
        assert!(matches!(err, PollerError::Decode(_)));
    }

    #[test]
    fn test_parse_document_mismatched_end_tag() {
        let err = parse_document(b"<rss><channel><item></channel></item></rss>").unwrap_err();
        assert!(matches!(err, PollerError::Decode(_)));
    }

    #[test]
    fn test_parse_document_empty_channel() {
        let rss = r#"<rss><channel><title>Quiet</title></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_parse_document_not_xml() {
        let err = parse_document(b"This is not XML").unwrap_err();
        assert!(matches!(err, PollerError::Decode(_)));
    }

    #[test]
    fn test_parse_document_without_channel() {
        let err = parse_document(b"<html><body>hello</body></html>").unwrap_err();
        assert!(matches!(err, PollerError::Decode(_)));
    }

    #[test]
    fn test_parse_document_not_utf8() {
        let err = parse_document(&[0x3c, 0xff, 0xfe, 0x3e]).unwrap_err();
        assert!(matches!(err, PollerError::Decode(_)));
    }

    #[test]
    fn test_http_fetcher_builds_from_default_config() {
        let fetcher = HttpFeedFetcher::new(&FetcherConfig::default()).unwrap();
        assert_eq!(fetcher.max_feed_size, 5 * 1024 * 1024);
    }
}
