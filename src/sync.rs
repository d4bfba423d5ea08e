//! Incremental fetch engine.
//!
//! Clients poll with one watermark per feed, recorded from the previous
//! response. A feed with a watermark returns everything that changed after
//! it, on the feed side or on the user's own read states. A feed without
//! one returns a bounded window of the newest articles. Fetching an article
//! implies visibility: the user's read state is created on first delivery.
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::storage::{Article, Author, Database, Feed};

/// How many articles a feed without a watermark returns.
const FALLBACK_LIMIT: i64 = 20;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    /// Watermark string is not an RFC 3339 timestamp. Caller error.
    #[error("Invalid watermark: {0}")]
    InvalidWatermark(String),
    /// Named feed is not among the user's subscriptions. Caller error.
    #[error("Unknown feed: {0}")]
    UnknownFeed(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Parse a client-supplied watermark.
pub fn parse_watermark(raw: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| SyncError::InvalidWatermark(raw.to_string()))
}

// ============================================================================
// Response Types
// ============================================================================

/// One delivered article with the user's read flag and its authors.
#[derive(Debug, Serialize)]
pub struct ChangedArticle {
    pub article: Article,
    pub authors: Vec<Author>,
    pub read: bool,
}

/// Everything that changed in one feed for one user.
#[derive(Debug, Serialize)]
pub struct FeedChanges {
    pub feed: Feed,
    pub articles: Vec<ChangedArticle>,
    /// Watermark candidate: newest delivered publish time, else the feed's
    /// own refresh stamp.
    pub last_updated: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub feeds: Vec<FeedChanges>,
    pub last_updated: Option<i64>,
}

// ============================================================================
// Fetch
// ============================================================================

/// Compute the changes of one feed for one user.
///
/// With a watermark: every article whose `published`, `updated`, or
/// user-side `last_touched` passed it, unlimited. Without one: the
/// `FALLBACK_LIMIT` newest. Either way delivery creates missing read
/// states, so an article handed to a client is tracked from then on.
pub async fn fetch_changes(
    db: &Database,
    user_id: i64,
    feed: &Feed,
    watermark: Option<DateTime<Utc>>,
    now: i64,
) -> Result<FeedChanges, SyncError> {
    let articles = match watermark {
        Some(since) => {
            db.changed_articles_since(feed.id, user_id, since.timestamp())
                .await?
        }
        None => db.recent_articles(feed.id, FALLBACK_LIMIT).await?,
    };

    let mut changed = Vec::with_capacity(articles.len());
    for article in articles {
        let state = db.ensure_read_state(user_id, article.id, now).await?;
        let authors = db.authors_for_article(article.id).await?;
        changed.push(ChangedArticle {
            read: state.read,
            authors,
            article,
        });
    }

    let last_updated = changed
        .first()
        .map(|c| c.article.published)
        .or(feed.last_refreshed);

    Ok(FeedChanges {
        feed: feed.clone(),
        articles: changed,
        last_updated,
    })
}

/// Compute changes across all of a user's subscriptions.
///
/// Feeds named in `watermarks` use their watermark; every other subscribed
/// feed is included with no watermark (the bounded-window path). Naming a
/// feed the user is not subscribed to is a caller error. URL matching is
/// case-insensitive.
pub async fn fetch_changes_multi(
    db: &Database,
    user_id: i64,
    watermarks: &[(String, DateTime<Utc>)],
    now: i64,
) -> Result<SyncResponse, SyncError> {
    let subscribed = db.subscribed_feeds(user_id).await?;

    let mut feeds = Vec::with_capacity(subscribed.len());
    let mut named: Vec<i64> = Vec::with_capacity(watermarks.len());

    for (url, watermark) in watermarks {
        let feed = subscribed
            .iter()
            .find(|f| f.url.eq_ignore_ascii_case(url))
            .ok_or_else(|| SyncError::UnknownFeed(url.clone()))?;
        named.push(feed.id);
        feeds.push(fetch_changes(db, user_id, feed, Some(*watermark), now).await?);
    }

    for feed in &subscribed {
        if !named.contains(&feed.id) {
            feeds.push(fetch_changes(db, user_id, feed, None, now).await?);
        }
    }

    let last_updated = feeds.iter().filter_map(|f| f.last_updated).max();

    Ok(SyncResponse {
        feeds,
        last_updated,
    })
}
