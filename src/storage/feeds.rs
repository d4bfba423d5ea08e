use anyhow::Result;

use super::schema::Database;
use super::types::Feed;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Find a feed by URL, creating a bare row if none exists.
    ///
    /// Matching is case-insensitive (the URL column carries NOCASE
    /// collation). A newly created feed has no title or metadata yet; those
    /// arrive with the first successful refresh.
    pub async fn find_or_create_feed(&self, url: &str) -> Result<Feed> {
        sqlx::query("INSERT INTO feeds (url) VALUES (?) ON CONFLICT(url) DO NOTHING")
            .bind(url)
            .execute(&self.pool)
            .await?;

        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, url, title, summary, image_url, last_refreshed FROM feeds WHERE url = ?",
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Look up a feed by URL (case-insensitive). Returns None if unknown.
    pub async fn feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, url, title, summary, image_url, last_refreshed FROM feeds WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    pub async fn feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            "SELECT id, url, title, summary, image_url, last_refreshed FROM feeds WHERE id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// All known feeds, oldest first. Input to the refresh cycle.
    pub async fn all_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT id, url, title, summary, image_url, last_refreshed FROM feeds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    /// Overwrite feed presentation fields from parsed channel metadata.
    ///
    /// Called at the end of a reconciliation pass; fields are replaced, not
    /// merged, so a channel that drops its description clears ours too.
    pub async fn apply_channel_meta(
        &self,
        feed_id: i64,
        title: Option<&str>,
        summary: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE feeds SET title = ?, summary = ?, image_url = ? WHERE id = ?")
            .bind(title)
            .bind(summary)
            .bind(image_url)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Advance the last-refresh timestamp, monotonically.
    ///
    /// MAX() guards against clock skew between concurrent refresh cycles:
    /// the stamp never moves backwards.
    pub async fn advance_last_refreshed(&self, feed_id: i64, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE feeds SET last_refreshed = MAX(COALESCE(last_refreshed, 0), ?) WHERE id = ?",
        )
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
