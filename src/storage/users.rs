use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user, or return the existing id for the same email.
    ///
    /// Account mechanics (passwords, tokens) live outside this crate; the
    /// core only needs a stable identity to hang subscriptions and read
    /// states on. Email matching is case-insensitive.
    pub async fn find_or_create_user(&self, email: &str) -> Result<i64> {
        sqlx::query("INSERT INTO users (email) VALUES (?) ON CONFLICT(email) DO NOTHING")
            .bind(email)
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}
