use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::time::Duration;

use crate::config::Config;
use crate::feed::fetcher::{download, FetchError};
use crate::feed::parser::{parse_channel, Channel};
use crate::feed::reconciler::{reconcile, ReconcileStats};
use crate::storage::{Database, Feed};

/// Per-feed result of a refresh cycle.
pub struct RefreshOutcome {
    pub feed_id: i64,
    pub url: String,
    pub result: Result<ReconcileStats, FetchError>,
}

/// Refresh one feed: download, parse, reconcile.
///
/// Every failure is scoped to the feed and lands in the outcome; callers
/// decide whether to log, retry, or move on.
pub async fn refresh_feed(
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
    feed: &Feed,
) -> RefreshOutcome {
    let result = async {
        let channel = fetch_channel(client, config, &feed.url).await?;
        reconcile(db, feed, &channel, Utc::now().timestamp())
            .await
            .map_err(|e| FetchError::Database(e.to_string()))
    }
    .await;

    if let Err(e) = &result {
        tracing::warn!(feed = %feed.url, error = %e, "Refresh failed");
    }

    RefreshOutcome {
        feed_id: feed.id,
        url: feed.url.clone(),
        result,
    }
}

/// Refresh every known feed.
///
/// Two phases. Downloads and parsing run concurrently through a bounded
/// pool (no database writes happen there), then the collected channels are
/// reconciled one at a time so the reconciler stays single-writer.
pub async fn refresh_all(
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
) -> Result<Vec<RefreshOutcome>> {
    let feeds = db.all_feeds().await?;
    if feeds.is_empty() {
        tracing::debug!("No feeds to refresh");
        return Ok(Vec::new());
    }
    let total = feeds.len();

    // Phase 1: network only
    let fetched: Vec<(Feed, Result<Channel, FetchError>)> = stream::iter(feeds.into_iter())
        .map(|feed| {
            let client = client.clone();
            async move {
                let result = fetch_channel(&client, config, &feed.url).await;
                (feed, result)
            }
        })
        .buffer_unordered(config.max_concurrent_fetches.max(1))
        .collect()
        .await;

    // Phase 2: sequential reconciliation
    let mut outcomes = Vec::with_capacity(total);
    let mut failed = 0usize;
    for (feed, fetch_result) in fetched {
        let result = match fetch_result {
            Ok(channel) => reconcile(db, &feed, &channel, Utc::now().timestamp())
                .await
                .map_err(|e| FetchError::Database(e.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            failed += 1;
            tracing::warn!(feed = %feed.url, error = %e, "Refresh failed");
        }
        outcomes.push(RefreshOutcome {
            feed_id: feed.id,
            url: feed.url,
            result,
        });
    }

    tracing::info!(
        feeds = total,
        ok = total - failed,
        failed = failed,
        "Refresh cycle complete"
    );

    Ok(outcomes)
}

async fn fetch_channel(
    client: &reqwest::Client,
    config: &Config,
    url: &str,
) -> Result<Channel, FetchError> {
    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let bytes = download(client, url, timeout).await?;
    parse_channel(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}
