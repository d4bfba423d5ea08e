use anyhow::Result;

use super::schema::Database;
use super::types::Feed;

impl Database {
    // ========================================================================
    // Subscription Operations
    // ========================================================================

    /// Subscribe a user to a feed. Returns true if the subscription is new.
    pub async fn add_subscription(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO subscriptions (user_id, feed_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a subscription. Returns true if one existed.
    pub async fn remove_subscription(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The feeds a user is subscribed to, in subscription id order.
    pub async fn subscribed_feeds(&self, user_id: i64) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            "SELECT f.id, f.url, f.title, f.summary, f.image_url, f.last_refreshed
             FROM feeds f
             JOIN subscriptions s ON s.feed_id = f.id
             WHERE s.user_id = ?
             ORDER BY f.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    // ========================================================================
    // Visibility Fan-out
    // ========================================================================

    /// Give a user a read-state record for every article the feed currently
    /// owns. Returns the number of records created.
    ///
    /// Called when a user subscribes to a feed that already has articles.
    /// Set-based INSERT OR IGNORE: existing records are never overwritten, so
    /// re-running after a partial failure (the job system is at-least-once)
    /// cannot reset a read flag.
    pub async fn ensure_visibility(&self, user_id: i64, feed_id: i64, now: i64) -> Result<u64> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO read_states (user_id, article_id, read, last_touched)
             SELECT ?, id, 0, ? FROM articles WHERE feed_id = ?",
        )
        .bind(user_id)
        .bind(now)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop the user's read history for one feed's articles, and only that
    /// feed's. Returns the number of records removed.
    ///
    /// Read states reached through other feeds stay untouched; ownership at
    /// revoke time decides which articles count as "this feed's".
    pub async fn revoke_visibility(&self, user_id: i64, feed_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM read_states
             WHERE user_id = ?
               AND article_id IN (SELECT id FROM articles WHERE feed_id = ?)",
        )
        .bind(user_id)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feed_with_articles(db: &Database, url: &str, count: i64) -> i64 {
        let feed = db.find_or_create_feed(url).await.unwrap();
        for i in 0..count {
            db.insert_article(
                feed.id,
                &format!("{url}/p/{i}"),
                Some(&format!("Post {i}")),
                None,
                None,
                1000 + i,
                None,
            )
            .await
            .unwrap();
        }
        feed.id
    }

    #[tokio::test]
    async fn test_subscribe_and_list() {
        let db = test_db().await;
        let user = db.find_or_create_user("u@example.com").await.unwrap();
        let feed_id = seed_feed_with_articles(&db, "https://a.com/feed", 0).await;

        assert!(db.add_subscription(user, feed_id).await.unwrap());
        assert!(
            !db.add_subscription(user, feed_id).await.unwrap(),
            "second subscribe is a no-op"
        );

        let feeds = db.subscribed_feeds(user).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].id, feed_id);

        assert!(db.remove_subscription(user, feed_id).await.unwrap());
        assert!(db.subscribed_feeds(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_visibility_creates_one_state_per_article() {
        let db = test_db().await;
        let user = db.find_or_create_user("u@example.com").await.unwrap();
        let feed_id = seed_feed_with_articles(&db, "https://a.com/feed", 25).await;

        let created = db.ensure_visibility(user, feed_id, 5000).await.unwrap();
        assert_eq!(created, 25);

        // All start unread
        let articles = db.recent_articles(feed_id, 100).await.unwrap();
        for article in &articles {
            let rs = db.read_state(user, article.id).await.unwrap().unwrap();
            assert!(!rs.read);
        }
    }

    #[tokio::test]
    async fn test_ensure_visibility_never_overwrites() {
        let db = test_db().await;
        let user = db.find_or_create_user("u@example.com").await.unwrap();
        let feed_id = seed_feed_with_articles(&db, "https://a.com/feed", 3).await;

        db.ensure_visibility(user, feed_id, 5000).await.unwrap();

        let article = &db.recent_articles(feed_id, 1).await.unwrap()[0];
        db.set_read_by_url(user, &article.url, true, 6000)
            .await
            .unwrap();

        let created = db.ensure_visibility(user, feed_id, 7000).await.unwrap();
        assert_eq!(created, 0, "all states already exist");

        let rs = db.read_state(user, article.id).await.unwrap().unwrap();
        assert!(rs.read, "fan-out re-run must not reset the read flag");
        assert_eq!(rs.last_touched, 6000, "fan-out re-run must not touch");
    }

    #[tokio::test]
    async fn test_revoke_visibility_scoped_to_feed() {
        let db = test_db().await;
        let user = db.find_or_create_user("u@example.com").await.unwrap();
        let feed_a = seed_feed_with_articles(&db, "https://a.com/feed", 3).await;
        let feed_b = seed_feed_with_articles(&db, "https://b.com/feed", 2).await;

        db.ensure_visibility(user, feed_a, 5000).await.unwrap();
        db.ensure_visibility(user, feed_b, 5000).await.unwrap();

        let removed = db.revoke_visibility(user, feed_a).await.unwrap();
        assert_eq!(removed, 3);

        for article in db.recent_articles(feed_a, 10).await.unwrap() {
            assert!(db.read_state(user, article.id).await.unwrap().is_none());
        }
        for article in db.recent_articles(feed_b, 10).await.unwrap() {
            assert!(
                db.read_state(user, article.id).await.unwrap().is_some(),
                "other feeds' read history survives"
            );
        }
    }
}
