//! The operations surface the outer layers (HTTP handlers, schedulers)
//! call into. Holds no state beyond its dependencies.
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::feed::discovery;
use crate::feed::refresh::{self, RefreshOutcome};
use crate::storage::{Article, Database, Feed};
use crate::sync::{self, parse_watermark, SyncError, SyncResponse};

/// One row of a paged article listing.
#[derive(Debug, Serialize)]
pub struct PageEntry {
    pub article: Article,
    /// The caller's read flag; None when browsing anonymously.
    pub read: Option<bool>,
}

#[derive(Clone)]
pub struct FeedService {
    db: Database,
    client: reqwest::Client,
    config: Config,
}

impl FeedService {
    pub fn new(db: Database, client: reqwest::Client, config: Config) -> Self {
        Self { db, client, config }
    }

    /// Direct storage access for the layers above (identity management,
    /// admin tooling) that need more than the sync surface.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribe a user to each URL that turns out to be a feed.
    ///
    /// URLs that are not feeds are dropped with a warning, never an error.
    /// A feed seen for the first time is filled by a background refresh;
    /// subscribing to an already-known feed fans its articles out to the
    /// user immediately. Returns the accepted URLs.
    pub async fn subscribe(&self, user_id: i64, urls: &[String]) -> Result<Vec<String>> {
        let mut accepted = Vec::new();

        for url in urls {
            let Some(feed_url) = discovery::is_feed(&self.db, &self.client, &self.config, url).await
            else {
                tracing::warn!(url = %url, "Subscription rejected, not a feed");
                continue;
            };

            let already_known = self.db.feed_by_url(&feed_url).await?.is_some();
            let feed = self.db.find_or_create_feed(&feed_url).await?;
            self.db.add_subscription(user_id, feed.id).await?;

            if already_known {
                let created = self
                    .db
                    .ensure_visibility(user_id, feed.id, Utc::now().timestamp())
                    .await?;
                tracing::debug!(feed = %feed.url, user_id = user_id, created = created, "Fanned out existing articles");
            } else {
                // First subscriber triggers the initial fill. Fire and
                // forget; a failed first refresh is repaired by the next
                // scheduled cycle.
                let db = self.db.clone();
                let client = self.client.clone();
                let config = self.config.clone();
                tokio::spawn(async move {
                    refresh::refresh_feed(&db, &client, &config, &feed).await;
                });
            }

            accepted.push(feed_url);
        }

        Ok(accepted)
    }

    /// Drop subscriptions, taking the user's read history for those feeds
    /// with them. Unknown URLs are ignored. Returns the URLs that were
    /// actually unsubscribed.
    pub async fn unsubscribe(&self, user_id: i64, urls: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();

        for url in urls {
            let Some(feed) = self.db.feed_by_url(url).await? else {
                tracing::debug!(url = %url, "Unsubscribe for unknown feed, ignoring");
                continue;
            };
            if self.db.remove_subscription(user_id, feed.id).await? {
                let revoked = self.db.revoke_visibility(user_id, feed.id).await?;
                tracing::debug!(feed = %feed.url, user_id = user_id, revoked = revoked, "Unsubscribed");
                removed.push(feed.url);
            }
        }

        Ok(removed)
    }

    pub async fn list_subscriptions(&self, user_id: i64) -> Result<Vec<Feed>> {
        self.db.subscribed_feeds(user_id).await
    }

    // ========================================================================
    // Incremental Fetch
    // ========================================================================

    /// One sync poll: raw `(feed_url, watermark)` pairs in, changes out.
    ///
    /// Feeds not named in `watermarks` are included through the bounded
    /// no-watermark path.
    pub async fn fetch(
        &self,
        user_id: i64,
        watermarks: &[(String, String)],
    ) -> Result<SyncResponse, SyncError> {
        let parsed: Vec<(String, DateTime<Utc>)> = watermarks
            .iter()
            .map(|(url, raw)| Ok((url.clone(), parse_watermark(raw)?)))
            .collect::<Result<_, SyncError>>()?;

        sync::fetch_changes_multi(&self.db, user_id, &parsed, Utc::now().timestamp()).await
    }

    /// Flip read flags by article URL. Only articles already delivered to
    /// this user are affected; the rest are counted as misses. Returns how
    /// many flags were applied.
    pub async fn mark_read(&self, user_id: i64, flags: &[(String, bool)]) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut applied = 0;

        for (url, read) in flags {
            if self.db.set_read_by_url(user_id, url, *read, now).await? {
                applied += 1;
            } else {
                tracing::debug!(url = %url, user_id = user_id, "No read state for article, flag ignored");
            }
        }

        Ok(applied)
    }

    // ========================================================================
    // Browsing and Refresh
    // ========================================================================

    /// One page of a feed's articles, newest first.
    ///
    /// Anonymous callers get bare articles. With a user, each row carries
    /// that user's read flag, and delivery creates missing read states the
    /// same way the incremental fetch does.
    pub async fn list_articles_page(
        &self,
        feed_url: &str,
        page: u32,
        user_id: Option<i64>,
    ) -> Result<Vec<PageEntry>, SyncError> {
        let feed = self
            .db
            .feed_by_url(feed_url)
            .await?
            .ok_or_else(|| SyncError::UnknownFeed(feed_url.to_string()))?;
        let articles = self
            .db
            .articles_page(feed.id, page, self.config.page_size)
            .await?;

        let now = Utc::now().timestamp();
        let mut entries = Vec::with_capacity(articles.len());
        for article in articles {
            let read = match user_id {
                Some(user) => Some(self.db.ensure_read_state(user, article.id, now).await?.read),
                None => None,
            };
            entries.push(PageEntry { article, read });
        }
        Ok(entries)
    }

    pub async fn refresh_all(&self) -> Result<Vec<RefreshOutcome>> {
        refresh::refresh_all(&self.db, &self.client, &self.config).await
    }
}
