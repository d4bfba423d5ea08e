use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the database
    #[error("The database is locked by another process. Please stop it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// A feed known to the system.
///
/// Identity is the feed URL, unique case-insensitively. Title, summary, and
/// image are overwritten from channel metadata on every successful refresh;
/// `last_refreshed` only ever advances forward.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    /// Unix seconds of the last successful reconciliation, None before the
    /// first one completes.
    pub last_refreshed: Option<i64>,
}

/// A deduplicated article in the shared store.
///
/// Identity is the absolute article URL, unique case-insensitively across ALL
/// feeds: two feeds referencing the same URL share one row. `feed_id` is the
/// owning feed, which the reconciler re-points when a different feed most
/// recently observed the URL.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// Unix seconds; required. Items without a published date get the
    /// ingestion time.
    pub published: i64,
    /// Unix seconds of the item's own updated stamp, when the feed provides
    /// one.
    pub updated: Option<i64>,
}

/// An author, deduplicated case-insensitively by name across all articles.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

/// Per-(user, article) read tracking.
///
/// A row exists iff the article has been delivered to the user, either by the
/// subscription fan-out or lazily when an incremental fetch first surfaces it.
/// `read` defaults to false (unread); `last_touched` is bumped on every write
/// so user-side events can trip the incremental fetch's watermark comparison.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadState {
    pub user_id: i64,
    pub article_id: i64,
    pub read: bool,
    pub last_touched: i64,
}
