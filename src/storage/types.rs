use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another instance of the application has locked the database
    #[error("Another gleaner process appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
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
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One linked upstream identity with its stored access pair.
///
/// Created on successful token exchange, mutated only to refresh the
/// pair, never deleted by the pipeline.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credential {
    pub id: i64,
    pub handle: String,
    pub access_token: String,
    pub access_secret: String,
}

/// A remote account observed in some credential's follow graph.
///
/// `last_updated` is the ingest checkpoint: the creation time (unix
/// seconds) of the newest post already ingested. It only ever moves
/// forward.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub handle: String,
    pub last_updated: i64,
}

/// A new timeline entry about to be persisted.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub remote_id: String,
    pub body: String,
    pub created_at: i64,
    pub url: String,
}

/// One ingested timeline entry.
///
/// `url` is the global dedup key; `seen` is flipped later by the reading
/// surface, never by the pipeline.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub account_id: i64,
    pub credential_id: i64,
    pub remote_id: String,
    pub body: String,
    pub created_at: i64,
    pub url: String,
    pub seen: bool,
}

/// A deduped URL referenced by one or more posts.
///
/// The enrichment fields (`cleaned_text`, `title`, `excerpt`, `byline`)
/// are nullable and populated asynchronously by the content extractor.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SharedLink {
    pub id: i64,
    pub url: String,
    pub quoted_text: String,
    pub first_shared: i64,
    pub seen: bool,
    pub cleaned_text: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
}

/// A link row joined with its sharer handles, as consumed by the feed
/// materializer. `sharers` is comma-joined in SQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedLink {
    pub url: String,
    pub quoted_text: String,
    pub first_shared: i64,
    pub cleaned_text: Option<String>,
    pub sharers: String,
}

/// A push-notification destination for one followed account.
///
/// Deactivated (never deleted) when the push provider reports the token
/// as expired.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PushTarget {
    pub id: i64,
    pub account_id: i64,
    pub token: String,
    pub active: bool,
    pub details: Option<String>,
}
