use anyhow::Result;
use std::time::Duration;

use crate::config::Config;
use crate::feed::fetcher::download;
use crate::feed::opml::extract_feed_urls;
use crate::feed::parser::parse_channel;
use crate::storage::Database;
use crate::util::is_http_url;

/// Decide whether `url` points at a syndication feed.
///
/// Non-http(s) schemes are rejected without any I/O. A URL the database
/// already knows as a feed (case-insensitive, tolerant of one trailing
/// slash either way) is accepted from storage alone; only unknown URLs
/// cost a download and parse. Returns the canonical URL to subscribe to.
pub async fn is_feed(
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
    url: &str,
) -> Option<String> {
    if !is_http_url(url) {
        return None;
    }

    match known_feed_url(db, url).await {
        Ok(Some(known)) => return Some(known),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Feed lookup failed");
            return None;
        }
    }

    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let bytes = match download(client, url, timeout).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Candidate feed unreachable");
            return None;
        }
    };

    match parse_channel(&bytes) {
        Ok(_) => Some(url.to_string()),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Candidate is not a feed");
            None
        }
    }
}

/// Decide whether `url` points at an OPML subscription list, returning the
/// feed URLs it carries. None when unreachable or not OPML.
pub async fn is_opml(client: &reqwest::Client, config: &Config, url: &str) -> Option<Vec<String>> {
    if !is_http_url(url) {
        return None;
    }

    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let bytes = match download(client, url, timeout).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Candidate OPML unreachable");
            return None;
        }
    };

    let content = String::from_utf8_lossy(&bytes);
    match extract_feed_urls(&content) {
        Ok(urls) => Some(urls),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Not an OPML document");
            None
        }
    }
}

async fn known_feed_url(db: &Database, url: &str) -> Result<Option<String>> {
    if let Some(feed) = db.feed_by_url(url).await? {
        return Ok(Some(feed.url));
    }
    // A feed stored with (or without) a trailing slash still matches
    let alternate = match url.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => format!("{url}/"),
    };
    Ok(db.feed_by_url(&alternate).await?.map(|f| f.url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Mock Blog</title>
    <item><title>Hello</title><link>https://example.com/p/1</link></item>
</channel></rss>"#;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_is_feed_rejects_non_http_without_io() {
        let db = test_db().await;
        let client = reqwest::Client::new();
        let config = Config::default();

        assert!(is_feed(&db, &client, &config, "ftp://example.com/feed")
            .await
            .is_none());
        assert!(is_feed(&db, &client, &config, "not a url").await.is_none());
    }

    #[tokio::test]
    async fn test_is_feed_accepts_parseable_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let db = test_db().await;
        let client = reqwest::Client::new();
        let config = Config::default();
        let url = format!("{}/feed", mock_server.uri());

        assert_eq!(is_feed(&db, &client, &config, &url).await, Some(url));
    }

    #[tokio::test]
    async fn test_is_feed_rejects_html_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>nope</body></html>"))
            .mount(&mock_server)
            .await;

        let db = test_db().await;
        let client = reqwest::Client::new();
        let config = Config::default();
        let url = format!("{}/page", mock_server.uri());

        assert!(is_feed(&db, &client, &config, &url).await.is_none());
    }

    #[tokio::test]
    async fn test_known_feed_short_circuits_without_network() {
        let db = test_db().await;
        db.find_or_create_feed("http://stored.example.com/feed")
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let config = Config::default();

        // The host is not reachable, so a hit proves no download happened
        let found = is_feed(&db, &client, &config, "http://stored.example.com/feed/").await;
        assert_eq!(found.as_deref(), Some("http://stored.example.com/feed"));

        let exact = is_feed(&db, &client, &config, "HTTP://STORED.example.com/feed").await;
        assert_eq!(exact.as_deref(), Some("http://stored.example.com/feed"));
    }

    #[tokio::test]
    async fn test_is_opml_extracts_urls() {
        let opml = r#"<opml version="2.0"><body>
    <outline text="A" xmlUrl="https://a.com/feed"/>
    <outline text="B" xmlUrl="https://b.com/feed"/>
</body></opml>"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(opml))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let config = Config::default();
        let url = format!("{}/subs.opml", mock_server.uri());

        let urls = is_opml(&client, &config, &url).await.unwrap();
        assert_eq!(urls, vec!["https://a.com/feed", "https://b.com/feed"]);
    }

    #[tokio::test]
    async fn test_is_opml_rejects_feed_document() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let config = Config::default();
        let url = format!("{}/feed", mock_server.uri());

        assert!(is_opml(&client, &config, &url).await.is_none());
    }
}
