use anyhow::Result;

use super::schema::Database;
use super::types::Article;

/// Columns fetched for every article query.
const ARTICLE_COLUMNS: &str = "id, feed_id, url, title, summary, content, published, updated";

impl Database {
    // ========================================================================
    // Article Lookups
    // ========================================================================

    /// Look up an article by absolute URL, case-insensitive, across all feeds.
    ///
    /// Article URLs are globally unique, so this is the reconciler's
    /// dedup probe before deciding between update, adopt, and create.
    pub async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    /// The `limit` most recent articles of a feed, newest published first.
    pub async fn recent_articles(&self, feed_id: i64, limit: i64) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles
             WHERE feed_id = ?
             ORDER BY published DESC
             LIMIT ?"
        ))
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    /// One page of a feed's articles for anonymous browsing, newest first.
    ///
    /// Pages are 1-based; a page past the end of the available articles is an
    /// empty vec, not an error.
    pub async fn articles_page(
        &self,
        feed_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Article>> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles
             WHERE feed_id = ?
             ORDER BY published DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(feed_id)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    /// Articles of a feed that changed for this user since `since`.
    ///
    /// An article counts as changed when the feed side moved (`published` or
    /// `updated` past the watermark) OR the user side moved (`last_touched`
    /// on the user's read state past the watermark, e.g. another device
    /// marked it read). Ordered by published descending, no limit.
    ///
    /// `updated` being NULL never satisfies the comparison, matching the
    /// "item carries no updated stamp" case.
    pub async fn changed_articles_since(
        &self,
        feed_id: i64,
        user_id: i64,
        since: i64,
    ) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT a.{}
             FROM articles a
             LEFT JOIN read_states rs ON rs.article_id = a.id AND rs.user_id = ?
             WHERE a.feed_id = ?
               AND (a.updated > ? OR a.published > ? OR rs.last_touched > ?)
             ORDER BY a.published DESC",
            ARTICLE_COLUMNS.replace(", ", ", a.")
        ))
        .bind(user_id)
        .bind(feed_id)
        .bind(since)
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert a brand-new article owned by `feed_id`.
    ///
    /// `published` is required at this layer; the reconciler substitutes the
    /// ingestion time when the item carries none.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_article(
        &self,
        feed_id: i64,
        url: &str,
        title: Option<&str>,
        summary: Option<&str>,
        content: Option<&str>,
        published: i64,
        updated: Option<i64>,
    ) -> Result<Article> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (feed_id, url, title, summary, content, published, updated)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(feed_id)
        .bind(url)
        .bind(title)
        .bind(summary)
        .bind(content)
        .bind(published)
        .bind(updated)
        .fetch_one(&self.pool)
        .await?;

        Ok(article)
    }

    /// Overwrite the mutable fields of an existing article.
    ///
    /// `published` is deliberately left untouched: it is fixed at creation so
    /// the incremental fetch ordering stays stable across re-ingestions.
    pub async fn update_article_fields(
        &self,
        article_id: i64,
        title: Option<&str>,
        summary: Option<&str>,
        content: Option<&str>,
        updated: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE articles SET title = ?, summary = ?, content = ?, updated = ? WHERE id = ?",
        )
        .bind(title)
        .bind(summary)
        .bind(content)
        .bind(updated)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Re-parent an article to a new owning feed.
    ///
    /// Policy decision, not a bug: when a URL shows up in a second feed's
    /// channel, ownership migrates to whichever feed most recently observed
    /// it ("last feed wins"). Read states and author links ride along
    /// untouched since they hang off the article id.
    pub async fn adopt_article(&self, article_id: i64, feed_id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET feed_id = ? WHERE id = ?")
            .bind(feed_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
