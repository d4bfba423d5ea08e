use anyhow::Result;

use crate::feed::parser::{Channel, Item};
use crate::storage::{Database, Feed};
use crate::util::normalize_item_url;

/// Per-category counts for one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Articles seen for the first time
    pub created: usize,
    /// Articles re-observed by their owning feed
    pub updated: usize,
    /// Articles re-parented from another feed
    pub adopted: usize,
    /// Items missing a link (dropped, no identity) or a title (ingested
    /// anyway, flagged here)
    pub invalid: usize,
    /// Items dropped by a per-item storage failure
    pub skipped: usize,
}

/// Fold a parsed channel into durable state.
///
/// Items are processed strictly in channel order. One bad item never aborts
/// the pass: structural problems count as `invalid`, storage failures are
/// logged and count as `skipped`, and the rest of the channel proceeds.
/// Channel metadata lands afterwards, and `last_refreshed` only ever moves
/// forward.
///
/// Single-writer: callers serialize reconciliation passes, so the
/// probe-then-write sequence per item never races another pass.
pub async fn reconcile(
    db: &Database,
    feed: &Feed,
    channel: &Channel,
    now: i64,
) -> Result<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    for item in &channel.entries {
        if let Err(e) = reconcile_item(db, feed, item, now, &mut stats).await {
            tracing::warn!(feed = %feed.url, error = %e, "Item reconciliation failed, skipping");
            stats.skipped += 1;
        }
    }

    // Replace presentation fields wholesale; a full-size image beats an icon
    let image = channel
        .image_url
        .as_deref()
        .or(channel.icon_url.as_deref());
    db.apply_channel_meta(
        feed.id,
        channel.title.as_deref(),
        channel.description.as_deref(),
        image,
    )
    .await?;
    db.advance_last_refreshed(feed.id, now).await?;

    tracing::debug!(
        feed = %feed.url,
        created = stats.created,
        updated = stats.updated,
        adopted = stats.adopted,
        invalid = stats.invalid,
        skipped = stats.skipped,
        "Reconciliation pass complete"
    );

    Ok(stats)
}

async fn reconcile_item(
    db: &Database,
    feed: &Feed,
    item: &Item,
    now: i64,
    stats: &mut ReconcileStats,
) -> Result<()> {
    let Some(raw_url) = item.url.as_deref() else {
        tracing::warn!(feed = %feed.url, title = ?item.title, "Item has no link, dropping");
        stats.invalid += 1;
        return Ok(());
    };
    // A titleless item is still ingested (nothing blocks ingestion but a
    // missing identity), just flagged
    if item.title.is_none() {
        tracing::warn!(feed = %feed.url, url = %raw_url, "Item has no title");
        stats.invalid += 1;
    }

    let url = normalize_item_url(raw_url, &feed.url);
    let title = item.title.as_deref();
    let summary = item.summary.as_deref();
    let content = item.content.as_deref();
    let updated = item.updated.map(|t| t.timestamp());

    let article = match db.article_by_url(&url).await? {
        None => {
            // Ordering needs a publish time even when the item has none:
            // fall back to the ingestion clock.
            let published = item.published.map(|t| t.timestamp()).unwrap_or(now);
            let article = db
                .insert_article(feed.id, &url, title, summary, content, published, updated)
                .await?;
            stats.created += 1;
            article
        }
        Some(existing) => {
            if existing.feed_id != feed.id {
                // Last feed wins: the channel currently carrying the URL
                // takes ownership, read states ride along on the article id.
                db.adopt_article(existing.id, feed.id).await?;
                stats.adopted += 1;
            } else {
                stats.updated += 1;
            }
            db.update_article_fields(existing.id, title, summary, content, updated)
                .await?;
            existing
        }
    };

    if let Some(author) = &item.author {
        let row = db
            .find_or_create_author(&author.name, author.email.as_deref())
            .await?;
        db.attach_author(article.id, row.id).await?;
    }

    Ok(())
}
