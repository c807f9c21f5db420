use chrono::Utc;

use super::db::Database;
use super::types::{Feed, FeedWithOwner, StorageError};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

impl Database {
    /// Register a feed owned by `user_id`. The URL is globally unique;
    /// a duplicate yields `StorageError::Duplicate`.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, StorageError> {
        let now = Utc::now().timestamp();
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StorageError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?
            .ok_or(StorageError::NotFound)
    }

    /// All feeds with their owners' names, for the `feeds` listing.
    pub async fn list_feeds_with_owners(&self) -> Result<Vec<FeedWithOwner>, StorageError> {
        sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.name AS name, f.url AS url, u.name AS owner
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Atomically claim the next feed to fetch.
    ///
    /// Selects the feed whose `last_fetched_at` is oldest (never-fetched
    /// feeds first) and stamps it with `now` in the same statement, so two
    /// aggregators polling the same store cannot claim one feed twice.
    /// Returns `None` when the store has no feeds at all.
    pub async fn claim_next_feed(&self, now: i64) -> Result<Option<Feed>, StorageError> {
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC, id ASC
                LIMIT 1
            )
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Record that `user_id` follows `feed_id`. Following a feed twice
    /// yields `StorageError::Duplicate`.
    pub async fn create_follow(&self, user_id: i64, feed_id: i64) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(())
    }

    /// Names of the feeds `user_id` follows, alphabetical.
    pub async fn follows_for_user(&self, user_id: i64) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT f.name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY f.name
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Remove a follow record. `NotFound` when the user was not following.
    pub async fn delete_follow(&self, user_id: i64, feed_id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
