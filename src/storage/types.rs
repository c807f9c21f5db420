use sqlx::FromRow;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors.
///
/// `Duplicate` and `NotFound` are classified out of raw sqlx errors so
/// callers can react to them without string-matching: the aggregation loop
/// swallows `Duplicate` on post insertion, and command handlers turn both
/// into user-facing messages.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An insert hit a UNIQUE constraint (post link, feed URL, user name).
    #[error("row already exists")]
    Duplicate,

    /// A lookup matched no row.
    #[error("not found")]
    NotFound,

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Classify a sqlx error, mapping UNIQUE constraint violations to
    /// `Duplicate` and everything else to `Database`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StorageError::Duplicate;
            }
        }
        StorageError::Database(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered user. Names are globally unique.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A subscribed RSS source, uniquely identified by URL.
///
/// `last_fetched_at` is NULL until the aggregation loop first claims the
/// feed; it is only ever written by the claim statement.
#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One ingested article, deduplicated by canonical link.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Candidate post built by the aggregation loop before insertion.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
}

/// Row for the `feeds` listing: feed plus its owner's name.
#[derive(Debug, Clone, FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner: String,
}
