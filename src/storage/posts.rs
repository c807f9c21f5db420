use chrono::Utc;

use super::db::Database;
use super::types::{NewPost, Post, StorageError};

const POST_COLUMNS: &str =
    "id, feed_id, title, url, description, published_at, created_at, updated_at";

impl Database {
    /// Insert a post. The canonical link is globally unique: re-ingesting
    /// an item already stored yields `StorageError::Duplicate`, which the
    /// aggregation loop treats as an expected no-op.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, StorageError> {
        let now = Utc::now().timestamp();
        sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {POST_COLUMNS}
        "#
        ))
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Newest posts from the feeds `user_id` follows.
    pub async fn posts_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Post>, StorageError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.url, p.description,
                   p.published_at, p.created_at, p.updated_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// All posts for one feed, newest first. Used by tests and diagnostics.
    pub async fn posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StorageError> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE feed_id = ? ORDER BY published_at DESC, id ASC"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }
}
