use anyhow::Result;

use super::schema::Database;
use super::types::Author;

impl Database {
    // ========================================================================
    // Author Operations
    // ========================================================================

    /// Find an author by name (case-insensitive), creating one on first sight.
    ///
    /// Get-or-insert against the NOCASE unique constraint: the INSERT OR
    /// IGNORE either wins or loses to a concurrent writer, and the re-read
    /// returns whichever row ended up in place. A duplicate-name constraint
    /// hit is "already exists", never an error.
    pub async fn find_or_create_author(&self, name: &str, email: Option<&str>) -> Result<Author> {
        sqlx::query("INSERT INTO authors (name, email) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(email)
            .execute(&self.pool)
            .await?;

        let author = sqlx::query_as::<_, Author>(
            "SELECT id, name, email FROM authors WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(author)
    }

    /// Attach an author to an article. Idempotent many-to-many insert.
    pub async fn attach_author(&self, article_id: i64, author_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO article_authors (article_id, author_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn authors_for_article(&self, article_id: i64) -> Result<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT au.id, au.name, au.email
             FROM authors au
             JOIN article_authors aa ON aa.author_id = au.id
             WHERE aa.article_id = ?
             ORDER BY au.name",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(authors)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_find_or_create_author_reuses_by_name() {
        let db = test_db().await;

        let first = db.find_or_create_author("Jane Doe", None).await.unwrap();
        let again = db.find_or_create_author("jane doe", None).await.unwrap();
        assert_eq!(first.id, again.id, "name match is case-insensitive");
        assert_eq!(again.name, "Jane Doe", "original spelling is kept");
    }

    #[tokio::test]
    async fn test_attach_author_is_idempotent() {
        let db = test_db().await;
        let feed = db
            .find_or_create_feed("https://example.com/feed")
            .await
            .unwrap();
        let article = db
            .insert_article(
                feed.id,
                "https://example.com/p/1",
                Some("Post"),
                None,
                None,
                100,
                None,
            )
            .await
            .unwrap();
        let author = db.find_or_create_author("Jane Doe", None).await.unwrap();

        db.attach_author(article.id, author.id).await.unwrap();
        db.attach_author(article.id, author.id).await.unwrap();

        let authors = db.authors_for_article(article.id).await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].name, "Jane Doe");
    }

    #[tokio::test]
    async fn test_author_shared_across_articles() {
        let db = test_db().await;
        let feed = db
            .find_or_create_feed("https://example.com/feed")
            .await
            .unwrap();
        let a1 = db
            .insert_article(
                feed.id,
                "https://example.com/p/1",
                Some("One"),
                None,
                None,
                100,
                None,
            )
            .await
            .unwrap();
        let a2 = db
            .insert_article(
                feed.id,
                "https://example.com/p/2",
                Some("Two"),
                None,
                None,
                200,
                None,
            )
            .await
            .unwrap();

        let author = db.find_or_create_author("Jane Doe", None).await.unwrap();
        db.attach_author(a1.id, author.id).await.unwrap();
        db.attach_author(a2.id, author.id).await.unwrap();

        assert_eq!(db.authors_for_article(a1.id).await.unwrap().len(), 1);
        assert_eq!(db.authors_for_article(a2.id).await.unwrap().len(), 1);
    }
}
