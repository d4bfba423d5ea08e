use anyhow::Result;

use super::schema::Database;
use super::types::ReadState;

impl Database {
    // ========================================================================
    // Read-state Operations
    // ========================================================================

    /// Fetch the user's read state for one article, lazily creating an
    /// unread record if none exists yet.
    ///
    /// This is the "fetch implies visibility" cache-fill: get-or-insert with
    /// the insert racing tolerated through the UNIQUE(user_id, article_id)
    /// constraint, then re-read. No locking; losing the race just means
    /// reading the winner's row.
    pub async fn ensure_read_state(
        &self,
        user_id: i64,
        article_id: i64,
        now: i64,
    ) -> Result<ReadState> {
        sqlx::query(
            "INSERT OR IGNORE INTO read_states (user_id, article_id, read, last_touched)
             VALUES (?, ?, 0, ?)",
        )
        .bind(user_id)
        .bind(article_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let state = sqlx::query_as::<_, ReadState>(
            "SELECT user_id, article_id, read, last_touched
             FROM read_states WHERE user_id = ? AND article_id = ?",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(state)
    }

    pub async fn read_state(&self, user_id: i64, article_id: i64) -> Result<Option<ReadState>> {
        let state = sqlx::query_as::<_, ReadState>(
            "SELECT user_id, article_id, read, last_touched
             FROM read_states WHERE user_id = ? AND article_id = ?",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Set the read flag for the user's state on the article at `url`.
    ///
    /// Only updates a state that already exists (the article must have been
    /// delivered to the user first); returns false otherwise. Last write
    /// wins, and `last_touched` is bumped so other devices see the flip on
    /// their next incremental fetch.
    pub async fn set_read_by_url(
        &self,
        user_id: i64,
        url: &str,
        read: bool,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE read_states SET read = ?, last_touched = ?
             WHERE user_id = ?
               AND article_id = (SELECT id FROM articles WHERE url = ?)",
        )
        .bind(read)
        .bind(now)
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
